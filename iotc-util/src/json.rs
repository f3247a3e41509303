/// (De)serialize a [`std::time::Duration`] as whole milliseconds, for use
/// with `#[serde(with = "millis")]`
pub mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, ser::Error};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(duration.as_millis())
            .map_err(|_| S::Error::custom(format!("{duration:?} does not fit in milliseconds")))?;
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
