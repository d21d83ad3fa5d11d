use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Text form of a finished digest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashEncoding {
    /// No text form; only the raw digest is kept.
    None,
    #[default]
    UpperHex,
    LowerHex,
    Base64,
}

pub fn encode_digest(digest: &[u8], encoding: HashEncoding) -> String {
    match encoding {
        HashEncoding::None => String::new(),
        HashEncoding::UpperHex => hex::encode_upper(digest),
        HashEncoding::LowerHex => hex::encode(digest),
        HashEncoding::Base64 => STANDARD.encode(digest),
    }
}
