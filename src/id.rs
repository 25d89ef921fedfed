use uuid::Uuid;

/// Failure to obtain randomness from the operating system.
#[derive(Debug, thiserror::Error)]
#[error("system random source unavailable: {0}")]
pub struct RandomSourceError(getrandom::Error);

/// Generates a random (version 4) UUID from 16 bytes of OS randomness.
pub fn generate_v4() -> Result<Uuid, RandomSourceError> {
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes).map_err(RandomSourceError)?;
    Ok(v4_from_random_bytes(bytes))
}

/// Hyphenated lowercase form of [`generate_v4`], e.g.
/// `"3b241101-e2bb-4255-8caf-4136c566a962"`.
pub fn generate_v4_string() -> Result<String, RandomSourceError> {
    generate_v4().map(|id| id.hyphenated().to_string())
}

/// Stamps the RFC 4122 version (`0100`) and variant (`10xx`) bits onto raw bytes.
pub fn v4_from_random_bytes(mut bytes: [u8; 16]) -> Uuid {
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    Uuid::from_bytes(bytes)
}
