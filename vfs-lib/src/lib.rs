pub mod ids;
pub mod error;
pub mod validation;

pub mod storage;
pub mod path;
pub mod fs;
pub mod token;

pub fn string_to_len_char(length: usize, ch: char) -> String {
    std::iter::repeat(ch).take(length).collect()
}

pub fn string_to_len(length: usize) -> String {
    string_to_len_char(length, 'a')
}
