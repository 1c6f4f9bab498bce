//! opaque identity tokens. a token is the bincode encoding of [`Fields`]
//! followed by a keyed blake3 MAC of that encoding, all of it URL safe base64
//! without padding. encoding is deterministic so the same fields always
//! produce the same token for a given key.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Serialize, Deserialize};

use crate::ids::{UserId, GroupId, PublicHash};
use crate::storage::StorageType;

pub const KEY_LEN: usize = 32;
pub const MAC_LEN: usize = blake3::OUT_LEN;
pub const MAX_TOKEN_CHARS: usize = 8192;

pub type Key = [u8; KEY_LEN];

#[inline]
pub fn empty_key() -> Key {
    [0; KEY_LEN]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fields {
    pub user_id: UserId,
    pub storage_type: StorageType,
    pub path: String,
    pub name: String,
    pub shared: Option<bool>,
    pub public_hash: Option<PublicHash>,
    pub group_id: Option<GroupId>,
}

impl Fields {
    pub fn new<P, N>(user_id: UserId, storage_type: StorageType, path: P, name: N) -> Self
    where
        P: Into<String>,
        N: Into<String>,
    {
        Fields {
            user_id,
            storage_type,
            path: path.into(),
            name: name.into(),
            shared: None,
            public_hash: None,
            group_id: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is not valid base64")]
    InvalidEncoding,

    #[error("token is malformed")]
    Malformed,

    #[error("token signature does not match")]
    BadSignature,

    #[error("failed to serialize token fields")]
    Serialize,
}

fn sign(key: &Key, payload: &[u8]) -> blake3::Hash {
    blake3::keyed_hash(key, payload)
}

pub fn encode(key: &Key, fields: &Fields) -> Result<String, TokenError> {
    let mut payload = bincode::serialize(fields)
        .map_err(|_| TokenError::Serialize)?;

    let mac = sign(key, &payload);
    payload.extend_from_slice(mac.as_bytes());

    Ok(URL_SAFE_NO_PAD.encode(payload))
}

pub fn decode(key: &Key, token: &str) -> Result<Fields, TokenError> {
    if token.is_empty() || token.len() > MAX_TOKEN_CHARS {
        return Err(TokenError::Malformed);
    }

    let data = URL_SAFE_NO_PAD.decode(token)
        .map_err(|_| TokenError::InvalidEncoding)?;

    if data.len() <= MAC_LEN {
        return Err(TokenError::Malformed);
    }

    let (payload, given_mac) = data.split_at(data.len() - MAC_LEN);
    let Ok(given_mac): Result<[u8; MAC_LEN], _> = given_mac.try_into() else {
        return Err(TokenError::Malformed);
    };

    // blake3::Hash equality is constant time
    if sign(key, payload) != blake3::Hash::from(given_mac) {
        return Err(TokenError::BadSignature);
    }

    bincode::deserialize(payload).map_err(|_| TokenError::Malformed)
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_key() -> Key {
        let mut key = empty_key();
        key[0] = 7;
        key[31] = 42;
        key
    }

    fn sample_fields() -> Vec<Fields> {
        let mut all_set = Fields::new(12, StorageType::Corporate, "/docs/sub", "report.pdf");
        all_set.shared = Some(true);
        all_set.public_hash = Some(String::from("AbCdEfGhIjKlMnOpQrStUvWx"));
        all_set.group_id = Some(3);

        let mut only_hash = Fields::new(1, StorageType::Personal, "", "");
        only_hash.public_hash = Some(String::from("hash"));

        vec![
            Fields::new(1, StorageType::Personal, "/docs", "a.txt"),
            Fields::new(2, StorageType::Custom(String::from("archive")), "", "root.txt"),
            Fields::new(3, StorageType::Shared, "/with space/ü", "emoji 😌.png"),
            all_set,
            only_hash,
        ]
    }

    #[test]
    fn encode_decode() {
        let key = test_key();

        for fields in sample_fields() {
            let token = match encode(&key, &fields) {
                Ok(t) => t,
                Err(err) => panic!("failed to encode fields: {}\nfields: {:?}", err, fields),
            };

            let decoded = match decode(&key, &token) {
                Ok(d) => d,
                Err(err) => panic!("failed to decode token: {}\ntoken: {:?}", err, token),
            };

            assert_eq!(fields, decoded);
        }
    }

    #[test]
    fn deterministic() {
        let key = test_key();
        let fields = Fields::new(1, StorageType::Personal, "/docs", "a.txt");

        assert_eq!(encode(&key, &fields).unwrap(), encode(&key, &fields).unwrap());
    }

    #[test]
    fn tampered() {
        let key = test_key();
        let fields = Fields::new(1, StorageType::Personal, "/docs", "a.txt");
        let token = encode(&key, &fields).unwrap();

        let mut data = URL_SAFE_NO_PAD.decode(&token).unwrap();
        // flip a byte of the user id
        data[0] ^= 0x01;
        let altered = URL_SAFE_NO_PAD.encode(&data);

        assert!(matches!(decode(&key, &altered), Err(TokenError::BadSignature)));
        assert!(matches!(decode(&empty_key(), &token), Err(TokenError::BadSignature)));
        assert!(matches!(decode(&key, "not base64 !"), Err(TokenError::InvalidEncoding)));
        assert!(matches!(decode(&key, "AAAA"), Err(TokenError::Malformed)));
        assert!(matches!(decode(&key, ""), Err(TokenError::Malformed)));
    }
}
