use loadline_core::prelude::ConfigError;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A string with `{{name}}` placeholders, parsed once when the workflow is compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidTemplate {
            template: source.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut rest = source;
        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }

            let after_open = &rest[open + 2..];
            let close = after_open
                .find("}}")
                .ok_or_else(|| invalid("unclosed `{{`"))?;
            let name = after_open[..close].trim();
            if name.is_empty() {
                return Err(invalid("empty placeholder"));
            }
            if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(invalid("placeholder names may only contain letters, digits and `_`"));
            }

            segments.push(Segment::Variable(name.to_string()));
            rest = &after_open[close + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Names of the placeholders, in order of appearance.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Variable(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute every placeholder. Returns the name of the first placeholder `lookup` cannot
    /// resolve as the error.
    pub fn render<'a>(&self, lookup: impl Fn(&str) -> Option<&'a str>) -> Result<String, String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => out.push_str(lookup(name).ok_or_else(|| name.clone())?),
            }
        }

        Ok(out)
    }
}
