//! Tool schema inference from identifiers, doc strings and parameter types

use std::{collections::HashMap, sync::OnceLock};

use regex::Regex;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    String,
    Integer,
    Number,
    Boolean,
}

impl SchemaType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySchema {
    pub kind: SchemaType,
    pub description: Option<String>,
    pub enum_values: Option<Vec<String>>,
}

impl PropertySchema {
    pub fn of(kind: SchemaType) -> Self {
        Self {
            kind,
            description: None,
            enum_values: None,
        }
    }

    pub fn to_json_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::from(self.kind.as_str()));
        if let Some(description) = &self.description {
            map.insert("description".to_string(), Value::from(description.as_str()));
        }
        if let Some(values) = &self.enum_values {
            map.insert("enum".to_string(), Value::from(values.clone()));
        }
        map
    }
}

pub trait ParamType {
    fn schema_type() -> SchemaType;
}

macro_rules! param_type {
    ($kind:ident => $($ty:ty),+) => {
        $(impl ParamType for $ty {
            fn schema_type() -> SchemaType {
                SchemaType::$kind
            }
        })+
    };
}

param_type!(String => String, &str);
param_type!(Integer => i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
param_type!(Number => f32, f64);
param_type!(Boolean => bool);

/// An enumeration exchanged on the wire as one of a fixed set of strings.
pub trait WireEnum: Sized + Copy + 'static {
    const VARIANTS: &'static [Self];

    fn wire_value(&self) -> &'static str;

    fn from_wire(value: &str) -> Option<Self> {
        Self::VARIANTS
            .iter()
            .copied()
            .find(|variant| variant.wire_value() == value)
    }

    fn wire_values() -> Vec<String> {
        Self::VARIANTS
            .iter()
            .map(|variant| variant.wire_value().to_string())
            .collect()
    }
}

/// Declares a fieldless enum together with its [`WireEnum`] implementation.
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $($variant),+
        }

        impl $crate::tools::WireEnum for $name {
            const VARIANTS: &'static [Self] = &[$(Self::$variant),+];

            fn wire_value(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }
    };
}

/// `get_weather_forecast` becomes `getWeatherForecast`.
pub fn tool_name(identifier: &str) -> String {
    let mut segments = identifier.split('_');
    let mut name = segments.next().unwrap_or_default().to_lowercase();
    for segment in segments {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
    }
    name
}

pub fn summary(doc: &str) -> String {
    doc.lines()
        .map(str::trim)
        .skip_while(|line| line.is_empty())
        .take_while(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn section_header() -> Option<&'static Regex> {
    static SECTION_HEADER: OnceLock<Option<Regex>> = OnceLock::new();
    SECTION_HEADER
        .get_or_init(|| Regex::new(r"^[A-Z][A-Za-z ]*:$").ok())
        .as_ref()
}

fn is_section_header(line: &str) -> bool {
    section_header().is_some_and(|header| header.is_match(line))
}

// Lines without a colon continue the previous argument's description.
pub fn argument_descriptions(doc: &str) -> HashMap<String, String> {
    let mut descriptions = HashMap::new();
    let mut lines = doc
        .lines()
        .map(str::trim)
        .skip_while(|line| !line.starts_with("Args:"));
    if lines.next().is_none() {
        return descriptions;
    }

    let mut last: Option<String> = None;
    for line in lines {
        if line.is_empty() {
            continue;
        }
        if is_section_header(line) {
            break;
        }
        match line.split_once(':') {
            Some((name, description)) => {
                // "count (int): ..." documents `count`
                let name = name.split_whitespace().next().unwrap_or_default().to_string();
                if name.is_empty() {
                    continue;
                }
                descriptions.insert(name.clone(), description.trim().to_string());
                last = Some(name);
            }
            None => {
                if let Some(text) = last.as_ref().and_then(|name| descriptions.get_mut(name)) {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(line);
                }
            }
        }
    }
    descriptions
}
