///
/// The logical type a `FieldSpec` coerces a raw string value into.
///
/// `Optional` wraps another `SemanticType` and means "absent or blank is
/// valid; when present, coerce as the wrapped type" - everything else is
/// required. This generalises the original's implicit pydantic
/// `Optional[...]` annotations into an explicit, declarative variant.
///
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SemanticType {
    String,
    Int,
    Decimal,
    Float,
    Bool,
    Date,
    Datetime,
    Optional(Box<SemanticType>),
}

impl SemanticType {
    pub fn optional(inner: SemanticType) -> SemanticType {
        SemanticType::Optional(Box::new(inner))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, SemanticType::Optional(_))
    }

    /// The type to coerce into once "is this present at all" has been
    /// decided - strips one layer of `Optional`.
    pub fn inner(&self) -> &SemanticType {
        match self {
            SemanticType::Optional(inner) => inner,
            other => other,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SemanticType::String => "string",
            SemanticType::Int => "int",
            SemanticType::Decimal => "decimal",
            SemanticType::Float => "float",
            SemanticType::Bool => "bool",
            SemanticType::Date => "date",
            SemanticType::Datetime => "datetime",
            SemanticType::Optional(inner) => inner.as_str(),
        }
    }
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_optional() {
            write!(f, "optional<{}>", self.inner().as_str())
        } else {
            write!(f, "{}", self.as_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_strips_to_inner() {
        let t = SemanticType::optional(SemanticType::Int);
        assert!(t.is_optional());
        assert_eq!(t.inner(), &SemanticType::Int);
    }

    #[test]
    fn display_matches_original_names() {
        assert_eq!(SemanticType::Decimal.to_string(), "decimal");
        assert_eq!(SemanticType::optional(SemanticType::Date).to_string(), "optional<date>");
    }
}
