use crate::ServiceError;
use chrono::NaiveDate;
use serde_derive::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// A subscription of a user to a paid service.
///
/// The aggregate operation also uses this type for its trailing total record, see
/// [`Subscription::total`].
#[derive(Serialize, Deserialize, Debug, Default, Eq, PartialEq, Clone, TypedBuilder)]
pub struct Subscription {
    #[serde(default, skip_serializing_if = "is_zero")]
    #[builder(default)]
    pub id: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    #[builder(setter(into))]
    pub service_name: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub price: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    #[builder(setter(into))]
    pub user_id: String,
    /// Month the subscription starts in, `MM-YYYY` on the wire.
    #[serde(default, with = "month_year", skip_serializing_if = "Option::is_none")]
    #[builder(setter(strip_option))]
    pub start_date: Option<NaiveDate>,
    #[serde(default, with = "month_year", skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub end_date: Option<NaiveDate>,
    /// Only set on the total record of an aggregate result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub total_sum: Option<i64>,
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

impl Subscription {
    /// The synthetic record closing an aggregate result: nothing but the summed price.
    pub fn total(sum: i64) -> Self {
        Self {
            total_sum: Some(sum),
            ..Self::default()
        }
    }

    pub fn is_total(&self) -> bool {
        self.total_sum.is_some()
    }

    /// Checks the fields a stored subscription needs. The id is not checked here,
    /// creation ignores it and update resolves it against the store.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.service_name.trim().is_empty() {
            return Err(ServiceError::InvalidRecord(
                "service_name must not be empty".to_string(),
            ));
        }

        if self.user_id.trim().is_empty() {
            return Err(ServiceError::InvalidRecord(
                "user_id must not be empty".to_string(),
            ));
        }

        if self.price < 0 {
            return Err(ServiceError::InvalidRecord(format!(
                "price must not be negative, got {}",
                self.price
            )));
        }

        let start_date = self.start_date.ok_or_else(|| {
            ServiceError::InvalidRecord("start_date must be set".to_string())
        })?;

        match self.end_date {
            Some(end_date) if end_date < start_date => Err(ServiceError::InvalidRecord(format!(
                "end_date {} is before start_date {}",
                month_year::format(&end_date),
                month_year::format(&start_date)
            ))),
            _ => Ok(()),
        }
    }
}

/// Parameters of the aggregate operation.
///
/// Selects the subscriptions of `user_id` to `service_name` that start on or after
/// `period_start` and end on or before `period_end`.
#[derive(Serialize, Deserialize, Debug, Eq, PartialEq, Clone, TypedBuilder)]
pub struct AggregateQuery {
    #[builder(setter(into))]
    pub service_name: String,
    #[builder(setter(into))]
    pub user_id: String,
    #[serde(with = "month_year::required")]
    pub period_start: NaiveDate,
    #[serde(with = "month_year::required")]
    pub period_end: NaiveDate,
}

/// `MM-YYYY` encoding of dates. Parsed dates always land on the first day of the month.
pub mod month_year {
    use chrono::NaiveDate;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%m-%Y";

    pub fn format(date: &NaiveDate) -> String {
        date.format(FORMAT).to_string()
    }

    pub fn parse(value: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&format!("01-{}", value.trim()), "%d-%m-%Y").ok()
    }

    pub fn serialize<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(date) => serializer.serialize_str(&format(date)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(value) if !value.is_empty() => parse(&value)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("expected MM-YYYY, got {value:?}"))),
            _ => Ok(None),
        }
    }

    pub mod required {
        use chrono::NaiveDate;
        use serde::de::Error as _;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&super::format(date))
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = String::deserialize(deserializer)?;

            super::parse(&value)
                .ok_or_else(|| D::Error::custom(format!("expected MM-YYYY, got {value:?}")))
        }
    }
}
