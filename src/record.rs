//! Raw client records and the interactive client profile.
//!
//! A [`RawRecord`] is a flat mapping from field name to scalar. It is built
//! per request (or per CSV row) and discarded once aligned.

use std::collections::BTreeMap;

use clap::{Args, ValueEnum};
use serde_json::Value as Json;

use crate::align::AlignError;

/// `pdays` sentinel for "client was not previously contacted".
pub const PDAYS_NOT_CONTACTED: i64 = -1;

/// A single scalar cell of a raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Categorical value, one-hot expanded during alignment.
    Category(String),
    /// Numeric value, passed through unchanged.
    Number(f64),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Category(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Category(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(f64::from(value))
    }
}

/// One client row: field name -> scalar value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: BTreeMap<String, Value>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for fixtures.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a record from a JSON object.
    ///
    /// Strings become categorical, numbers numeric, booleans 1/0, and `null`
    /// leaves the field absent. Anything that is not a flat object of scalars
    /// is a schema error.
    pub fn from_json(doc: &Json) -> Result<Self, AlignError> {
        let object = doc.as_object().ok_or_else(|| {
            AlignError::Schema(format!(
                "expected a JSON object of field -> scalar, found {}",
                json_kind(doc)
            ))
        })?;

        let mut record = RawRecord::new();
        for (field, value) in object {
            match value {
                Json::Null => {}
                Json::Bool(b) => {
                    record.insert(field.as_str(), if *b { 1.0 } else { 0.0 });
                }
                Json::Number(n) => {
                    let number = n.as_f64().ok_or_else(|| {
                        AlignError::Schema(format!("field `{field}` holds an unrepresentable number"))
                    })?;
                    record.insert(field.as_str(), number);
                }
                Json::String(s) => {
                    record.insert(field.as_str(), s.as_str());
                }
                Json::Array(_) | Json::Object(_) => {
                    return Err(AlignError::Schema(format!(
                        "field `{field}` is {}, expected a scalar",
                        json_kind(value)
                    )));
                }
            }
        }
        Ok(record)
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

/// Declares a closed set of form choices with their wire labels.
macro_rules! form_choice {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
        pub enum $name {
            $(
                #[value(name = $label)]
                $variant,
            )+
        }

        impl $name {
            /// Category label as the classifier saw it at fit time.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }
    };
}

form_choice!(
    /// Client occupation.
    Job {
        Admin => "admin.",
        Unknown => "unknown",
        Unemployed => "unemployed",
        Management => "management",
        Housemaid => "housemaid",
        Entrepreneur => "entrepreneur",
        Student => "student",
        BlueCollar => "blue-collar",
        SelfEmployed => "self-employed",
        Retired => "retired",
        Technician => "technician",
        Services => "services",
    }
);

form_choice!(Marital {
    Married => "married",
    Divorced => "divorced",
    Single => "single",
});

form_choice!(Education {
    Unknown => "unknown",
    Secondary => "secondary",
    Primary => "primary",
    Tertiary => "tertiary",
});

form_choice!(YesNo {
    Yes => "yes",
    No => "no",
});

form_choice!(
    /// Contact communication type.
    Contact {
        Unknown => "unknown",
        Telephone => "telephone",
        Cellular => "cellular",
    }
);

form_choice!(Month {
    Jan => "jan",
    Feb => "feb",
    Mar => "mar",
    Apr => "apr",
    May => "may",
    Jun => "jun",
    Jul => "jul",
    Aug => "aug",
    Sep => "sep",
    Oct => "oct",
    Nov => "nov",
    Dec => "dec",
});

form_choice!(
    /// Outcome of the previous marketing campaign.
    Poutcome {
        Unknown => "unknown",
        Other => "other",
        Failure => "failure",
        Success => "success",
    }
);

/// Client attributes collected by the interactive form.
///
/// `pdays` is deliberately absent: the interactive path always injects
/// [`PDAYS_NOT_CONTACTED`].
#[derive(Args, Debug, Clone, PartialEq)]
pub struct ClientProfile {
    /// Age in years
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(18..=100))]
    pub age: u32,
    /// Job
    #[arg(long, value_enum, default_value_t = Job::Admin)]
    pub job: Job,
    /// Marital status
    #[arg(long, value_enum, default_value_t = Marital::Married)]
    pub marital: Marital,
    /// Education
    #[arg(long, value_enum, default_value_t = Education::Unknown)]
    pub education: Education,
    /// Has credit in default?
    #[arg(long, value_enum, default_value_t = YesNo::Yes)]
    pub default: YesNo,
    /// Has housing loan?
    #[arg(long, value_enum, default_value_t = YesNo::Yes)]
    pub housing: YesNo,
    /// Has personal loan?
    #[arg(long, value_enum, default_value_t = YesNo::Yes)]
    pub loan: YesNo,
    /// Preferred contact method
    #[arg(long, value_enum, default_value_t = Contact::Unknown)]
    pub contact: Contact,
    /// Last contact month
    #[arg(long, value_enum, default_value_t = Month::Jan)]
    pub month: Month,
    /// Last contact day of the month
    #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u32).range(1..=31))]
    pub day: u32,
    /// Last call duration in seconds
    #[arg(long, default_value_t = 180)]
    pub duration: u32,
    /// Number of contacts during this campaign
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=50))]
    pub campaign: u32,
    /// Number of contacts before this campaign
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub previous: u32,
    /// Outcome of the previous campaign
    #[arg(long, value_enum, default_value_t = Poutcome::Unknown)]
    pub poutcome: Poutcome,
}

impl Default for ClientProfile {
    fn default() -> Self {
        Self {
            age: 30,
            job: Job::Admin,
            marital: Marital::Married,
            education: Education::Unknown,
            default: YesNo::Yes,
            housing: YesNo::Yes,
            loan: YesNo::Yes,
            contact: Contact::Unknown,
            month: Month::Jan,
            day: 15,
            duration: 180,
            campaign: 1,
            previous: 0,
            poutcome: Poutcome::Unknown,
        }
    }
}

impl ClientProfile {
    /// Convert the form into a raw record, injecting `pdays = -1`.
    pub fn to_record(&self) -> RawRecord {
        RawRecord::new()
            .with("age", self.age)
            .with("job", self.job.as_str())
            .with("marital", self.marital.as_str())
            .with("education", self.education.as_str())
            .with("default", self.default.as_str())
            .with("housing", self.housing.as_str())
            .with("loan", self.loan.as_str())
            .with("contact", self.contact.as_str())
            .with("month", self.month.as_str())
            .with("day", self.day)
            .with("duration", self.duration)
            .with("campaign", self.campaign)
            .with("pdays", PDAYS_NOT_CONTACTED)
            .with("previous", self.previous)
            .with("poutcome", self.poutcome.as_str())
    }
}
