//! Ordered download-source lists: a primary origin with optional
//! operator-configured mirrors, honoring the `customSourcesFirst` toggle.

use reqwest::Url;

use crate::config::Properties;
use crate::error::UpdaterError;

/// Build the ordered source list for one artifact role.
///
/// `primary` is the vendor URL for the role. When `custom_key` names a
/// non-blank property, `derive` maps that base value to a concrete URL;
/// a derivation failure drops the custom entry with a warning rather than
/// failing the list.
pub fn source_list<F>(
    props: &Properties,
    primary: &str,
    custom_key: &str,
    derive: F,
) -> Vec<String>
where
    F: Fn(&str) -> Result<String, UpdaterError>,
{
    let custom = props.get_nonblank(custom_key).and_then(|base| {
        match derive(&base) {
            Ok(url) => Some(url),
            Err(err) => {
                log::warn!("ignoring unusable custom source {custom_key}={base}: {err}");
                None
            }
        }
    });

    match (custom, props.custom_sources_first()) {
        (Some(custom), true) => vec![custom, primary.to_string()],
        (Some(custom), false) => vec![primary.to_string(), custom],
        (None, _) => vec![primary.to_string()],
    }
}

/// Derivation for roles whose custom property is already the full base URL.
pub fn as_base(base: &str) -> Result<String, UpdaterError> {
    parse_checked(base.to_string())
}

/// Derivation joining a relative name onto the custom base. Bases are used
/// as given; operators are expected to configure a trailing slash.
pub fn with_suffix(suffix: &str) -> impl Fn(&str) -> Result<String, UpdaterError> + '_ {
    move |base: &str| parse_checked(format!("{base}{suffix}"))
}

/// Rebase a repository-relative artifact path onto every source base.
pub fn rebase_all(bases: &[String], path: &str) -> Vec<String> {
    bases.iter().map(|base| format!("{base}{path}")).collect()
}

fn parse_checked(url: String) -> Result<String, UpdaterError> {
    Url::parse(&url).map_err(|e| UpdaterError::Decode {
        context: url.clone(),
        message: e.to_string(),
    })?;
    Ok(url)
}
