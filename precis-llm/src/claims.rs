use precis_common::{PrecisError, Result};

/// Parse the claims list out of raw model text.
///
/// Models like to wrap JSON in prose or code fences, so only the slice from
/// the first `[` to the last `]` is decoded.
///
/// ```
/// use precis_llm::claims::parse_claims;
///
/// let claims = parse_claims(r#"Sure! ["claim A", "claim B"] thanks"#).unwrap();
/// assert_eq!(claims, vec!["claim A", "claim B"]);
/// assert!(parse_claims("[]").unwrap().is_empty());
/// assert!(parse_claims("no list here").is_err());
/// ```
pub fn parse_claims(raw: &str) -> Result<Vec<String>> {
    let (start, end) = match (raw.find('['), raw.rfind(']')) {
        (Some(s), Some(e)) if s < e => (s, e),
        _ => {
            return Err(PrecisError::MalformedResponse(
                "no JSON array found in the response".to_string(),
            ))
        }
    };

    let claims: Vec<String> = serde_json::from_str(&raw[start..=end])
        .map_err(|e| PrecisError::MalformedResponse(e.to_string()))?;

    Ok(claims
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect())
}
