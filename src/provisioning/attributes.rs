//! Student attributes stored as custom external IDs.

use serde::Serialize;

use crate::directory::ExternalId;

pub const MATRICNO: &str = "matricno";
pub const PROGRAMME: &str = "programme";
pub const SESSION: &str = "session";

/// Registration number, programme and session of an account.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StudentAttributes {
    pub matricno: Option<String>,
    pub programme: Option<String>,
    pub session: Option<String>,
}

impl StudentAttributes {
    /// Read the attributes carried by `ids`. The last entry of a type wins.
    pub fn extract(ids: &[ExternalId]) -> Self {
        let mut attributes = Self::default();
        for id in ids {
            let slot = if id.is_custom(MATRICNO) {
                &mut attributes.matricno
            } else if id.is_custom(PROGRAMME) {
                &mut attributes.programme
            } else if id.is_custom(SESSION) {
                &mut attributes.session
            } else {
                continue;
            };
            *slot = Some(id.value.clone());
        }
        attributes
    }

    /// External IDs for the attributes that are set and non-empty.
    pub fn to_external_ids(&self) -> Vec<ExternalId> {
        [
            (MATRICNO, &self.matricno),
            (SESSION, &self.session),
            (PROGRAMME, &self.programme),
        ]
        .into_iter()
        .filter_map(|(kind, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| ExternalId::custom(kind, v))
        })
        .collect()
    }

    /// Write the set attributes onto `ids`, updating an entry of the same
    /// custom type in place or appending a new one.
    pub fn merge_into(&self, ids: &mut Vec<ExternalId>) {
        for incoming in self.to_external_ids() {
            let kind = incoming.custom_type.as_deref().unwrap_or_default();
            let mut found = false;
            for id in ids.iter_mut().filter(|id| id.is_custom(kind)) {
                id.value.clone_from(&incoming.value);
                found = true;
            }
            if !found {
                ids.push(incoming);
            }
        }
    }
}

/// Whether `ids` carry `value` under the custom type `kind`.
pub fn has_attribute(ids: &[ExternalId], kind: &str, value: &str) -> bool {
    ids.iter().any(|id| id.is_custom(kind) && id.value == value)
}
