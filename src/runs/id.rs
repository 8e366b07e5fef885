use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

const RUN_ID_SALT_BITS: u32 = 32;
const RUN_ID_MAX_LEN: usize = 22;
static RUN_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Sortable run identifier: base62 of the current time in nanoseconds, salted
/// with the pid and a per-process counter.
pub fn generate_run_id() -> Result<String> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| {
            Error::io(
                "system clock before UNIX_EPOCH while generating run id",
                std::io::Error::other(err),
            )
        })?
        .as_nanos();
    let pid_component = ((std::process::id() as u128) & 0xFFFF) << 16;
    let seq_component = (RUN_ID_COUNTER.fetch_add(1, Ordering::Relaxed) as u128) & 0xFFFF;
    let entropy = (nanos << RUN_ID_SALT_BITS) | pid_component | seq_component;
    let id = base62_encode_u128(entropy);
    if id.len() > RUN_ID_MAX_LEN {
        return Err(Error::io(
            "run id overflow",
            std::io::Error::from(std::io::ErrorKind::InvalidData),
        ));
    }
    Ok(id)
}

/// `YYYYMMDDTHHMMSSZ` for the current UTC time.
pub fn now_utc_compact() -> String {
    let now = time::OffsetDateTime::now_utc();
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

fn base62_encode_u128(mut value: u128) -> String {
    const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut chars = Vec::new();
    while value > 0 {
        chars.push(ALPHABET[(value % 62) as usize] as char);
        value /= 62;
    }
    chars.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base62_known_values() {
        assert_eq!(base62_encode_u128(0), "0");
        assert_eq!(base62_encode_u128(61), "z");
        assert_eq!(base62_encode_u128(62), "10");
    }

    #[test]
    fn run_ids_are_unique_and_ordered() {
        let first = generate_run_id().unwrap();
        let second = generate_run_id().unwrap();
        assert_ne!(first, second);
        assert_eq!(first.len(), second.len());
        assert!(first < second);
    }

    #[test]
    fn compact_timestamp_shape() {
        let stamp = now_utc_compact();
        assert_eq!(stamp.len(), 16);
        assert_eq!(&stamp[8..9], "T");
        assert!(stamp.ends_with('Z'));
    }
}
