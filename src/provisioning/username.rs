//! Mailbox address derivation.

/// Largest numeric suffix tried before giving up.
pub const MAX_SUFFIX: u8 = 99;

/// Local part built from first initial, other-name initial and last name.
///
/// Returns `None` when the names hold no usable character.
pub fn base_local_part(
    firstname: &str,
    othername: Option<&str>,
    lastname: &str,
) -> Option<String> {
    let initial = |name: &str| {
        name.chars()
            .flat_map(char::to_lowercase)
            .find(|c| c.is_ascii_alphanumeric())
    };

    let mut local = String::new();
    local.extend(initial(firstname));
    local.extend(othername.and_then(initial));
    local.extend(
        lastname
            .chars()
            .flat_map(char::to_lowercase)
            .filter(|c| c.is_ascii_alphanumeric()),
    );

    (!local.is_empty()).then_some(local)
}

/// Normalise a mail domain, dropping a leading `@`.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_start_matches('@').to_lowercase()
}

/// Candidate addresses in the order they are tried: `base@domain`, then
/// `base01@domain` through `base99@domain`.
pub fn candidates<'a>(
    local: &'a str,
    domain: &'a str,
) -> impl Iterator<Item = String> + 'a {
    std::iter::once(format!("{local}@{domain}")).chain(
        (1..=MAX_SUFFIX).map(move |n| format!("{local}{n:02}@{domain}")),
    )
}
