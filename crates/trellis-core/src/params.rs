use std::rc::Rc;

use crate::errors::ParameterError;
use crate::frames::{AttributeValue, EventCallback, Frame, FrameKind, RenderFragment};

/// One named value bound onto a component.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub value: AttributeValue,
}

/// The direct parameters captured from a component frame's attribute run.
#[derive(Debug, Clone, Default)]
pub struct ParameterCollection {
    parameters: Vec<Parameter>,
}

impl ParameterCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.parameters.push(Parameter {
            name: name.into(),
            value,
        });
    }

    /// Collect the attribute run that follows a component frame.
    pub(crate) fn capture(frames: &[Frame], component_index: usize) -> Self {
        let mut parameters = Vec::new();
        for frame in &frames[component_index + 1..] {
            match &frame.kind {
                FrameKind::Attribute { name, value, .. } => parameters.push(Parameter {
                    name: name.clone(),
                    value: value.clone(),
                }),
                _ => break,
            }
        }
        Self { parameters }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.parameters.iter()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn as_slice(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| &p.value)
    }

    /// Positional comparison used to decide whether a retained child can
    /// skip a parameter update. Conservative: reference-typed values are
    /// never definitely equal.
    pub(crate) fn definitely_equals(&self, other: &ParameterCollection) -> bool {
        self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(other.parameters.iter())
                .all(|(a, b)| a.name == b.name && a.value.definitely_equals(&b.value))
    }
}

impl FromIterator<Parameter> for ParameterCollection {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        Self {
            parameters: iter.into_iter().collect(),
        }
    }
}

/// What a component sees during `apply_parameters`: its direct parameters
/// plus whatever cascading values resolved for it this delivery. Lookup is
/// case-insensitive and direct parameters shadow cascading ones.
pub struct ParameterView<'a> {
    direct: &'a [Parameter],
    cascading: &'a [Parameter],
}

impl<'a> ParameterView<'a> {
    pub fn new(direct: &'a [Parameter], cascading: &'a [Parameter]) -> Self {
        Self { direct, cascading }
    }

    pub fn direct(&self) -> &'a [Parameter] {
        self.direct
    }

    pub fn cascading(&self) -> &'a [Parameter] {
        self.cascading
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Parameter> {
        self.direct.iter().chain(self.cascading.iter())
    }

    pub fn get(&self, name: &str) -> Option<&'a AttributeValue> {
        self.iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| &p.value)
    }

    pub fn get_str(&self, name: &str) -> Option<&'a str> {
        self.get(name).and_then(AttributeValue::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(AttributeValue::as_bool)
    }

    pub fn get_callback(&self, name: &str) -> Option<&'a EventCallback> {
        self.get(name).and_then(AttributeValue::as_callback)
    }

    pub fn get_fragment(&self, name: &str) -> Option<&'a RenderFragment> {
        self.get(name).and_then(AttributeValue::as_fragment)
    }

    pub fn require_str(&self, name: &str) -> Result<&'a str, ParameterError> {
        match self.get(name) {
            Some(value) => value.as_str().ok_or_else(|| ParameterError::TypeMismatch {
                name: name.to_owned(),
                expected: "text",
            }),
            None => Err(ParameterError::Missing {
                name: name.to_owned(),
            }),
        }
    }

    /// Typed lookup of a `Data` parameter. Present-but-wrong-type is an
    /// error; absent is `Ok(None)`.
    pub fn get_data<T: 'static>(&self, name: &str) -> Result<Option<Rc<T>>, ParameterError> {
        match self.get(name) {
            Some(value) => match value.downcast::<T>() {
                Some(data) => Ok(Some(data)),
                None => Err(ParameterError::TypeMismatch {
                    name: name.to_owned(),
                    expected: std::any::type_name::<T>(),
                }),
            },
            None => Ok(None),
        }
    }

    pub fn require_data<T: 'static>(&self, name: &str) -> Result<Rc<T>, ParameterError> {
        self.get_data::<T>(name)?.ok_or_else(|| ParameterError::Missing {
            name: name.to_owned(),
        })
    }
}
