//! Client-supplied query parameters.
//!
//! A [`Request`] is an ordered, immutable list of `name=value` pairs. Features
//! read it by exact name ([`Request::values`]) or by range suffix family
//! ([`Request::range_values`]). Lookups never fail: an absent parameter just
//! reports "not present".

/// One named input value. No validation is performed on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Parameter {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Bounds found under `name.min` / `name.max`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeValues<'a> {
    pub min: Option<&'a str>,
    pub max: Option<&'a str>,
}

impl RangeValues<'_> {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Ordered parameters for a single query execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    params: Vec<Parameter>,
}

impl Request {
    pub fn new(params: impl IntoIterator<Item = Parameter>) -> Self {
        Request {
            params: params.into_iter().collect(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .map(|(k, v)| Parameter::new(k, v))
            .collect()
    }

    /// Parse an `application/x-www-form-urlencoded` string such as
    /// `category=electronics&category=books&rating.min=3`.
    ///
    /// Repeated names are kept in their original order; pairs with an empty
    /// name are skipped.
    pub fn from_query_string(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        url::form_urlencoded::parse(query.as_bytes())
            .filter(|(k, _)| !k.is_empty())
            .map(|(k, v)| Parameter::new(k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Values of every parameter named exactly `name`, in original order.
    pub fn values(&self, name: &str) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| p.name == name)
            .map(|p| p.value.as_str())
            .collect()
    }

    /// First value named exactly `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn range_values(&self, name: &str) -> RangeValues<'_> {
        RangeValues {
            min: self.first(&format!("{name}.min")),
            max: self.first(&format!("{name}.max")),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl FromIterator<Parameter> for Request {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        Request::new(iter)
    }
}

impl<'a> IntoIterator for &'a Request {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}
