use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{error::ApiError, recipes::repo::Recipe};

/// Request body for creating or fully replacing a recipe. Omitting
/// `is_publish` leaves the recipe a draft.
#[derive(Debug, Deserialize)]
pub struct RecipeBody {
    pub name: String,
    pub description: String,
    pub directions: String,
    pub cook_time: i32,
    pub num_of_servings: i32,
    #[serde(default)]
    pub is_publish: bool,
    #[serde(default)]
    pub image: Option<String>,
}

impl RecipeBody {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::validation("name", "May not be blank."));
        }
        if self.name.chars().count() > 255 {
            return Err(ApiError::validation(
                "name",
                "Must be 255 characters or fewer.",
            ));
        }
        if self.description.trim().is_empty() {
            return Err(ApiError::validation("description", "May not be blank."));
        }
        if self.directions.trim().is_empty() {
            return Err(ApiError::validation("directions", "May not be blank."));
        }
        if self.cook_time < 1 {
            return Err(ApiError::validation(
                "cook_time",
                "Must be a positive integer.",
            ));
        }
        if self.num_of_servings < 1 {
            return Err(ApiError::validation(
                "num_of_servings",
                "Must be a positive integer.",
            ));
        }
        Ok(())
    }
}

/// Query parameters for the public listing. `max_cook_time` stays a string
/// until [`ListParams::max_cook_time`] parses it, so a bad value can turn
/// into a field-level validation error instead of a silent drop.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub max_cook_time: Option<String>,
    pub ordering: Option<String>,
}

impl ListParams {
    pub fn search(&self) -> Option<&str> {
        match self.search.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(s),
        }
    }

    pub fn max_cook_time(&self) -> Result<Option<i32>, ApiError> {
        let raw = match self.max_cook_time.as_deref().map(str::trim) {
            None | Some("") => return Ok(None),
            Some(s) => s,
        };
        raw.parse::<i32>()
            .map(Some)
            .map_err(|_| ApiError::validation("max_cook_time", "Must be a valid integer."))
    }

    /// Ascending only on an explicit `ordering=updated_at`; every other
    /// value, recognised or not, keeps the newest-first default.
    pub fn newest_first(&self) -> bool {
        !matches!(self.ordering.as_deref().map(str::trim), Some("updated_at"))
    }

    /// True when the ordering is the default one, spelled out or omitted.
    pub fn default_ordering(&self) -> bool {
        matches!(
            self.ordering.as_deref().map(str::trim),
            None | Some("") | Some("-updated_at")
        )
    }
}

/// Recipe as rendered to clients. The author appears by username only.
#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub directions: String,
    pub cook_time: i32,
    pub num_of_servings: i32,
    pub is_publish: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub image: Option<String>,
    pub author: String,
}

impl From<Recipe> for RecipeResponse {
    fn from(r: Recipe) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            directions: r.directions,
            cook_time: r.cook_time,
            num_of_servings: r.num_of_servings,
            is_publish: r.is_publish,
            created_at: r.created_at,
            updated_at: r.updated_at,
            image: r.image,
            author: r.author,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn body() -> RecipeBody {
        RecipeBody {
            name: "Tomato soup".into(),
            description: "A soup of tomatoes".into(),
            directions: "Simmer and blend".into(),
            cook_time: 30,
            num_of_servings: 4,
            is_publish: false,
            image: None,
        }
    }

    #[test]
    fn valid_body_passes() {
        assert!(body().validate().is_ok());
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut b = body();
        b.name = "   ".into();
        let err = b.validate().unwrap_err();
        assert!(matches!(err, ApiError::Validation { field: "name", .. }));
    }

    #[test]
    fn overlong_name_is_rejected() {
        let mut b = body();
        b.name = "x".repeat(256);
        let err = b.validate().unwrap_err();
        assert!(matches!(err, ApiError::Validation { field: "name", .. }));
    }

    #[test]
    fn name_of_exactly_255_chars_passes() {
        let mut b = body();
        b.name = "x".repeat(255);
        assert!(b.validate().is_ok());
    }

    #[test]
    fn non_positive_counts_are_rejected() {
        for servings in [0, -1] {
            let mut b = body();
            b.num_of_servings = servings;
            let err = b.validate().unwrap_err();
            assert!(matches!(
                err,
                ApiError::Validation {
                    field: "num_of_servings",
                    ..
                }
            ));
        }
        let mut b = body();
        b.cook_time = 0;
        let err = b.validate().unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation {
                field: "cook_time",
                ..
            }
        ));
    }

    #[test]
    fn is_publish_defaults_to_false() {
        let parsed: RecipeBody = serde_json::from_str(
            r#"{"name":"a","description":"b","directions":"c","cook_time":5,"num_of_servings":1}"#,
        )
        .unwrap();
        assert!(!parsed.is_publish);
        assert!(parsed.image.is_none());
    }

    #[test]
    fn max_cook_time_parses_integers() {
        let params = ListParams {
            max_cook_time: Some("45".into()),
            ..Default::default()
        };
        assert_eq!(params.max_cook_time().unwrap(), Some(45));
    }

    #[test]
    fn max_cook_time_rejects_non_integers() {
        for bad in ["abc", "12.5", "1h"] {
            let params = ListParams {
                max_cook_time: Some(bad.into()),
                ..Default::default()
            };
            let err = params.max_cook_time().unwrap_err();
            assert!(matches!(
                err,
                ApiError::Validation {
                    field: "max_cook_time",
                    ..
                }
            ));
        }
    }

    #[test]
    fn empty_filters_count_as_absent() {
        let params = ListParams {
            search: Some("   ".into()),
            max_cook_time: Some("".into()),
            ordering: Some("".into()),
        };
        assert_eq!(params.search(), None);
        assert_eq!(params.max_cook_time().unwrap(), None);
        assert!(params.default_ordering());
    }

    #[test]
    fn ordering_variants() {
        let asc = ListParams {
            ordering: Some("updated_at".into()),
            ..Default::default()
        };
        assert!(!asc.newest_first());
        assert!(!asc.default_ordering());

        let explicit_desc = ListParams {
            ordering: Some("-updated_at".into()),
            ..Default::default()
        };
        assert!(explicit_desc.newest_first());
        assert!(explicit_desc.default_ordering());

        let unknown = ListParams {
            ordering: Some("name".into()),
            ..Default::default()
        };
        assert!(unknown.newest_first());
        assert!(!unknown.default_ordering());
    }

    #[test]
    fn response_serializes_timestamps_as_rfc3339() {
        let response = RecipeResponse {
            id: Uuid::new_v4(),
            name: "Stew".into(),
            description: "Hearty".into(),
            directions: "Simmer".into(),
            cook_time: 90,
            num_of_servings: 6,
            is_publish: true,
            created_at: datetime!(2024-03-01 10:30:00 UTC),
            updated_at: datetime!(2024-03-02 08:00:00 UTC),
            image: None,
            author: "erin".into(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"created_at\":\"2024-03-01T10:30:00Z\""));
        assert!(json.contains("\"updated_at\":\"2024-03-02T08:00:00Z\""));
        assert!(json.contains("\"author\":\"erin\""));
    }

    #[test]
    fn listing_value_keeps_the_response_field_order() {
        let response = RecipeResponse {
            id: Uuid::nil(),
            name: "Stew".into(),
            description: "Hearty".into(),
            directions: "Simmer".into(),
            cook_time: 90,
            num_of_servings: 6,
            is_publish: true,
            created_at: datetime!(2024-03-01 10:30:00 UTC),
            updated_at: datetime!(2024-03-02 08:00:00 UTC),
            image: None,
            author: "erin".into(),
        };

        // The listing path serializes through `serde_json::Value`; the keys
        // must come out in the order the struct serializer writes them.
        let data = serde_json::to_value(vec![response]).unwrap();
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.starts_with(r#"[{"id":"#));
        assert!(json.ends_with(r#""author":"erin"}]"#));
    }
}
