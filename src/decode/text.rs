use std::path::Path;

use super::Decoded;

/// Windows-1251 upper half (0x80..=0xBF); 0xC0..=0xFF is contiguous А..я.
/// 0x98 is unassigned.
const CP1251_HIGH: [Option<char>; 64] = [
    Some('Ђ'), Some('Ѓ'), Some('‚'), Some('ѓ'), Some('„'), Some('…'), Some('†'), Some('‡'),
    Some('€'), Some('‰'), Some('Љ'), Some('‹'), Some('Њ'), Some('Ќ'), Some('Ћ'), Some('Џ'),
    Some('ђ'), Some('\u{2018}'), Some('\u{2019}'), Some('“'), Some('”'), Some('•'), Some('\u{2013}'), Some('\u{2014}'),
    None, Some('™'), Some('љ'), Some('›'), Some('њ'), Some('ќ'), Some('ћ'), Some('џ'),
    Some('\u{a0}'), Some('Ў'), Some('ў'), Some('Ј'), Some('¤'), Some('Ґ'), Some('¦'), Some('§'),
    Some('Ё'), Some('©'), Some('Є'), Some('«'), Some('¬'), Some('\u{ad}'), Some('®'), Some('Ї'),
    Some('°'), Some('±'), Some('І'), Some('і'), Some('ґ'), Some('µ'), Some('¶'), Some('·'),
    Some('ё'), Some('№'), Some('є'), Some('»'), Some('ј'), Some('Ѕ'), Some('ѕ'), Some('ї'),
];

/// Plain files: UTF-8 first, then Windows-1251, then Latin-1 (which always
/// succeeds). The format tag names the encoding that worked.
pub fn read_text(path: &Path) -> Decoded {
    match std::fs::read(path) {
        Ok(bytes) => decode_bytes(bytes),
        Err(e) => Decoded::failure("error", &format!("Ошибка чтения файла: {e}")),
    }
}

fn decode_bytes(bytes: Vec<u8>) -> Decoded {
    match String::from_utf8(bytes) {
        Ok(text) => {
            let text = text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text);
            Decoded::new(text, "utf-8")
        }
        Err(e) => {
            let bytes = e.into_bytes();
            match decode_cp1251(&bytes) {
                Some(text) => Decoded::new(text, "cp1251"),
                None => Decoded::new(bytes.iter().map(|&b| b as char).collect(), "latin-1"),
            }
        }
    }
}

fn decode_cp1251(bytes: &[u8]) -> Option<String> {
    bytes
        .iter()
        .map(|&b| match b {
            0x00..=0x7F => Some(b as char),
            0x80..=0xBF => CP1251_HIGH[(b - 0x80) as usize],
            0xC0..=0xFF => char::from_u32(0x0410 + (b - 0xC0) as u32),
        })
        .collect()
}
