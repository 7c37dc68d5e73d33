//! The operator table for filter rules and groups.

/// A logical filter operator, addressed by its lowercase token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperate {
    // Combinators
    And, // "and"
    Or,  // "or"

    // Comparisons
    Equal,          // "equal"
    NotEqual,       // "notequal"
    Less,           // "less"
    LessOrEqual,    // "lessorequal"
    Greater,        // "greater"
    GreaterOrEqual, // "greaterorequal"

    // Pattern matching
    StartWith, // "startwith"
    EndWith,   // "endwith"
    Contains,  // "contains"

    // Set membership against a comma-delimited column
    In, // "in"
}

/// Token and SQL rendering for every operator, in declaration order.
static OPERATE_TABLE: [(FilterOperate, &str, &str); 12] = [
    (FilterOperate::And, "and", "and"),
    (FilterOperate::Or, "or", "or"),
    (FilterOperate::Equal, "equal", "="),
    (FilterOperate::NotEqual, "notequal", "!="),
    (FilterOperate::Less, "less", "<"),
    (FilterOperate::LessOrEqual, "lessorequal", "<="),
    (FilterOperate::Greater, "greater", ">"),
    (FilterOperate::GreaterOrEqual, "greaterorequal", ">="),
    (FilterOperate::StartWith, "startwith", "like"),
    (FilterOperate::EndWith, "endwith", "like"),
    (FilterOperate::Contains, "contains", "like"),
    (FilterOperate::In, "in", "in"),
];

impl FilterOperate {
    /// Looks up an operator by its exact token.
    pub fn from_token(token: &str) -> Option<Self> {
        OPERATE_TABLE
            .iter()
            .find(|(_, t, _)| *t == token)
            .map(|(op, _, _)| *op)
    }

    /// Parses a group combinator. Blank or anything other than `and`/`or`
    /// (case-insensitive) falls back to `And`.
    pub fn combinator(token: &str) -> Self {
        match Self::from_token(&token.trim().to_lowercase()) {
            Some(Self::Or) => Self::Or,
            _ => Self::And,
        }
    }

    /// The token used in filter input.
    pub fn token(self) -> &'static str {
        self.entry().1
    }

    /// The textual rendering used in a predicate.
    pub fn sql(self) -> &'static str {
        self.entry().2
    }

    fn entry(self) -> &'static (FilterOperate, &'static str, &'static str) {
        // Every variant has exactly one row.
        &OPERATE_TABLE[self as usize]
    }

    /// Applies the wildcard transform for pattern operators.
    pub fn decorate_value(self, value: &str) -> String {
        match self {
            Self::StartWith => format!("{}%", value),
            Self::EndWith => format!("%{}", value),
            Self::Contains => format!("%{}%", value),
            _ => value.to_string(),
        }
    }
}
