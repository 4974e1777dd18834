use std::time::Duration;

pub fn deserialize_duration_from_millis<'de, D>(d: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let millis: u64 = serde::Deserialize::deserialize(d)?;
    Ok(Duration::from_millis(millis))
}
