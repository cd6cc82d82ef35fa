use crate::ast::{BExpr, Literal};

common_enum! {
    pub enum Pattern {
        Wildcard,
        Binding(String),
        Literal(Literal),
        Object(Vec<PatternField>),
        Array(PatternArray),
        /// Matches values of a type, then the inner pattern
        Type(PatternType),
    }
}

common_struct! {
    pub struct PatternField {
        pub name: String,
        pub pattern: Pattern,
    }
}

common_struct! {
    pub struct PatternArray {
        pub items: Vec<Pattern>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub rest: Option<String>,
    }
}

common_struct! {
    pub struct PatternType {
        pub ty: BExpr,
        pub inner: Box<Pattern>,
    }
}

impl Pattern {
    pub fn binding(name: impl Into<String>) -> Self {
        Pattern::Binding(name.into())
    }

    pub fn as_binding(&self) -> Option<&str> {
        match self {
            Pattern::Binding(name) => Some(name),
            _ => None,
        }
    }

    /// Names introduced by the pattern, left to right.
    pub fn bound_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, out: &mut Vec<String>) {
        match self {
            Pattern::Wildcard | Pattern::Literal(_) => {}
            Pattern::Binding(name) => out.push(name.clone()),
            Pattern::Object(fields) => fields.iter().for_each(|f| f.pattern.collect_names(out)),
            Pattern::Array(array) => {
                array.items.iter().for_each(|p| p.collect_names(out));
                out.extend(array.rest.iter().cloned());
            }
            Pattern::Type(ty) => ty.inner.collect_names(out),
        }
    }

    /// Matches every value without inspecting it.
    pub fn is_irrefutable(&self) -> bool {
        matches!(self, Pattern::Wildcard | Pattern::Binding(_))
    }
}
