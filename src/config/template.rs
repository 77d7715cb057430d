// ABOUTME: Argument templates referring to other apps' addresses.
// ABOUTME: `{{app.host}}` and `{{app.ports.name}}` are resolved once the referenced app is deployed.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Host { app: String },
    Port { app: String, port: String },
}

impl Segment {
    pub fn app(&self) -> Option<&str> {
        match self {
            Segment::Literal(_) => None,
            Segment::Host { app } | Segment::Port { app, .. } => Some(app),
        }
    }
}

/// A parsed argument; rendering substitutes every placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgTemplate {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateError(pub String);

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TemplateError {}

impl ArgTemplate {
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = raw;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| TemplateError(format!("unterminated placeholder in {raw:?}")))?;
            segments.push(parse_placeholder(after[..end].trim())?);
            rest = &after[end + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Apps this argument refers to.
    pub fn apps(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(Segment::app)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Render with `lookup` supplying the value of each placeholder.
    pub fn render<F>(&self, mut lookup: F) -> Result<String, TemplateError>
    where
        F: FnMut(&Segment) -> Result<String, TemplateError>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                placeholder => out.push_str(&lookup(placeholder)?),
            }
        }
        Ok(out)
    }
}

fn parse_placeholder(inner: &str) -> Result<Segment, TemplateError> {
    let parts: Vec<&str> = inner.split('.').collect();
    match parts.as_slice() {
        [app, "host"] if !app.is_empty() => Ok(Segment::Host {
            app: app.to_string(),
        }),
        [app, "ports", port] if !app.is_empty() && !port.is_empty() => Ok(Segment::Port {
            app: app.to_string(),
            port: port.to_string(),
        }),
        _ => Err(TemplateError(format!(
            "invalid placeholder {{{{{inner}}}}}, expected app.host or app.ports.name"
        ))),
    }
}
