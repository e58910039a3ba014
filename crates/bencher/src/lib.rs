use micro_params::schema::{Location, Style};
use micro_params::style::{Serialization, Shape};

#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    input: TestInput,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, input: TestInput) -> Self {
        Self { name, group, input }
    }

    pub fn small(name: &'static str, input: TestInput) -> Self {
        Self::new(name, TestGroup::Small, input)
    }

    pub fn normal(name: &'static str, input: TestInput) -> Self {
        Self::new(name, TestGroup::Normal, input)
    }

    pub fn large(name: &'static str, input: TestInput) -> Self {
        Self::new(name, TestGroup::Large, input)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn input(&self) -> &TestInput {
        &self.input
    }
}

/// A raw wire value together with the serialization it was written in.
#[derive(Debug, Copy, Clone)]
pub struct TestInput {
    parameter: &'static str,
    raw: &'static str,
    serialization: Serialization,
    shape: Shape,
}

impl TestInput {
    pub const fn new(parameter: &'static str, raw: &'static str, serialization: Serialization, shape: Shape) -> Self {
        Self { parameter, raw, serialization, shape }
    }

    pub const fn query(parameter: &'static str, raw: &'static str, style: Style, explode: bool, shape: Shape) -> Self {
        Self::new(parameter, raw, Serialization { location: Location::Query, style, explode }, shape)
    }

    pub const fn path(parameter: &'static str, raw: &'static str, style: Style, explode: bool, shape: Shape) -> Self {
        Self::new(parameter, raw, Serialization { location: Location::Path, style, explode }, shape)
    }

    pub fn parameter(&self) -> &'static str {
        self.parameter
    }

    /// A query string for query inputs, a path segment for path inputs.
    pub fn raw(&self) -> &'static str {
        self.raw
    }

    pub fn serialization(&self) -> Serialization {
        self.serialization
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Decoded key/value pairs of a query input.
    pub fn pairs(&self) -> Vec<(String, String)> {
        serde_urlencoded::from_str(self.raw).unwrap_or_default()
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}
