use crate::validation::check_control_whitespace;

pub const PUBLIC_HASH_SIZE: usize = 24;
pub const PUBLIC_HASH_ALPHABET: [char; 63] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
    '_'
];

pub type UserId = i64;
pub type TenantId = i64;
pub type GroupId = i64;
pub type PublicHash = String;

/// a user id of zero is the anonymous user and never owns storage
#[inline]
pub fn user_id_valid(given: &UserId) -> bool {
    *given > 0
}

pub fn create_public_hash() -> PublicHash {
    nanoid::format(nanoid::rngs::default, &PUBLIC_HASH_ALPHABET, PUBLIC_HASH_SIZE)
}

pub fn public_hash_valid(given: &str) -> bool {
    given.chars().count() == PUBLIC_HASH_SIZE
        && check_control_whitespace(given, Some(PUBLIC_HASH_SIZE))
        && given.chars().all(|ch| PUBLIC_HASH_ALPHABET.contains(&ch))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn public_hash_validation() {
        for _ in 0..16 {
            let hash = create_public_hash();

            assert!(public_hash_valid(&hash), "generated hash failed {:?}", hash);
        }

        let invalid = [
            String::new(),
            String::from("short"),
            crate::string_to_len(PUBLIC_HASH_SIZE + 1),
            crate::string_to_len_char(PUBLIC_HASH_SIZE, '-'),
        ];

        for test in invalid {
            assert!(!public_hash_valid(&test), "invalid string failed {:?}", test);
        }
    }

    #[test]
    fn anonymous_user() {
        assert!(!user_id_valid(&0));
        assert!(!user_id_valid(&-4));
        assert!(user_id_valid(&1));
    }
}
