// ABOUTME: Custom serde deserializers for stack file types.
// ABOUTME: Handles the mode table, whose app lists may never be empty.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::types::AppName;

pub fn deserialize_modes<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, NonEmpty<AppName>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: BTreeMap<String, Vec<AppName>> = BTreeMap::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(mode, apps)| {
            NonEmpty::from_vec(apps)
                .map(|apps| (mode.clone(), apps))
                .ok_or_else(|| serde::de::Error::custom(format!("mode {mode} lists no apps")))
        })
        .collect()
}
