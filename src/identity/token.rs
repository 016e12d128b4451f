use base64::Engine;

const TOKEN_BYTES: usize = 32;

/// Mint an opaque 256-bit token, base64url without padding (43 chars).
/// Used for both session names and CSRF tokens.
pub fn mint_token() -> Result<String, getrandom::Error> {
    let mut buf = [0u8; TOKEN_BYTES];
    getrandom::getrandom(&mut buf)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}
