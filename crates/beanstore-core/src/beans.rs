//! Bean write models, field validation, and the bulk seed file format.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, ValidationError};

/// Substituted whenever a bean is written without an image.
pub const PLACEHOLDER_IMAGE_URL: &str =
    "https://archive.org/download/placeholder-image/placeholder-image.jpg";

const MAX_DESCRIPTION_CHARS: usize = 500;

/// A single currency symbol, whole units, and exactly two decimal places (`£39.26`).
static COST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\d\s]\d+\.\d{2}$").unwrap_or_else(|e| panic!("invalid cost pattern: {e}"))
});

/// Fields for a bean that does not exist in the store yet.
///
/// `is_featured` is only honoured by bulk import; API inserts always clear it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBean {
    pub name: String,
    pub cost: String,
    #[serde(default)]
    pub description: String,
    pub colour: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub sort_index: i32,
    #[serde(default)]
    pub is_featured: bool,
}

impl NewBean {
    /// The image URL to persist, falling back to [`PLACEHOLDER_IMAGE_URL`].
    #[must_use]
    pub fn resolved_image(&self) -> &str {
        self.image
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(PLACEHOLDER_IMAGE_URL)
    }
}

/// Partial update of a bean's descriptive fields.
///
/// `None` or a blank string keeps the stored value. The featured flag is not
/// part of this type; only the selector writes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BeanUpdate {
    pub name: Option<String>,
    pub cost: Option<String>,
    pub description: Option<String>,
    pub colour: Option<String>,
    pub image: Option<String>,
}

impl BeanUpdate {
    /// Supplied, non-blank fields only.
    #[must_use]
    pub fn normalized(&self) -> Self {
        fn keep(v: Option<&String>) -> Option<String> {
            v.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
        }
        Self {
            name: keep(self.name.as_ref()),
            cost: keep(self.cost.as_ref()),
            description: keep(self.description.as_ref()),
            colour: keep(self.colour.as_ref()),
            image: keep(self.image.as_ref()),
        }
    }
}

/// Validate a textual cost such as `£12.50`.
///
/// # Errors
///
/// Returns [`ValidationError`] when the value does not match the cost format.
pub fn validate_cost(cost: &str) -> Result<(), ValidationError> {
    if COST_PATTERN.is_match(cost) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "cost",
            format!(
                "must be a currency symbol followed by an amount with two decimals, got '{cost}'"
            ),
        ))
    }
}

fn validate_description(description: &str) -> Result<(), ValidationError> {
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(ValidationError::new(
            "description",
            format!("can't exceed {MAX_DESCRIPTION_CHARS} characters"),
        ));
    }
    Ok(())
}

fn require_non_blank(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    Ok(())
}

/// Validate every field of an insert.
///
/// # Errors
///
/// Returns the first failing field as a [`ValidationError`].
pub fn validate_new_bean(bean: &NewBean) -> Result<(), ValidationError> {
    require_non_blank("name", &bean.name)?;
    require_non_blank("colour", &bean.colour)?;
    require_non_blank("cost", &bean.cost)?;
    validate_cost(bean.cost.trim())?;
    validate_description(&bean.description)
}

/// Validate the supplied fields of an update.
///
/// # Errors
///
/// Returns the first failing field as a [`ValidationError`].
pub fn validate_bean_update(update: &BeanUpdate) -> Result<(), ValidationError> {
    let update = update.normalized();
    if let Some(cost) = &update.cost {
        validate_cost(cost)?;
    }
    if let Some(description) = &update.description {
        validate_description(description)?;
    }
    Ok(())
}

/// One entry of the seed file. Keys follow the legacy catalog export, which
/// mixes `PascalCase` and `camelCase`.
#[derive(Debug, Deserialize)]
struct SeedEntry {
    #[serde(alias = "Name")]
    name: String,
    #[serde(alias = "Cost")]
    cost: String,
    #[serde(default, alias = "Description")]
    description: String,
    #[serde(alias = "Colour", alias = "color")]
    colour: String,
    #[serde(default, alias = "Image")]
    image: Option<String>,
    #[serde(default, alias = "Index")]
    index: i32,
    #[serde(default, rename = "isBOTD", alias = "IsBOTD", alias = "is_featured")]
    is_botd: bool,
}

impl From<SeedEntry> for NewBean {
    fn from(entry: SeedEntry) -> Self {
        Self {
            name: entry.name,
            cost: entry.cost,
            description: entry.description,
            colour: entry.colour,
            image: entry.image,
            sort_index: entry.index,
            is_featured: entry.is_botd,
        }
    }
}

/// Load the bulk import file: a JSON array of beans.
///
/// At most one bean keeps its featured flag. The first flagged entry wins and
/// any later flags are cleared with a warning.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or parsed, or
/// [`ConfigError::Validation`] naming the first entry that fails
/// [`validate_new_bean`].
pub fn load_seed_file(path: &Path) -> Result<Vec<NewBean>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SeedFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let entries: Vec<SeedEntry> = serde_json::from_str(&content)?;
    let mut beans: Vec<NewBean> = entries.into_iter().map(NewBean::from).collect();

    for (pos, bean) in beans.iter().enumerate() {
        validate_new_bean(bean)
            .map_err(|e| ConfigError::Validation(format!("bean at position {pos}: {e}")))?;
    }

    let cleared = keep_first_featured(&mut beans);
    if cleared > 0 {
        tracing::warn!(
            cleared,
            path = %path.display(),
            "seed file flags more than one featured bean; keeping the first"
        );
    }

    Ok(beans)
}

/// Clears every featured flag after the first. Returns how many were cleared.
fn keep_first_featured(beans: &mut [NewBean]) -> usize {
    let mut seen = false;
    let mut cleared = 0;
    for bean in beans.iter_mut().filter(|b| b.is_featured) {
        if seen {
            bean.is_featured = false;
            cleared += 1;
        } else {
            seen = true;
        }
    }
    cleared
}
