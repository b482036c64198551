//! Static table of technology categories and the tokens known in each.
//!
//! The local aggregator walks [`TechCatalog::categories`] to decide which
//! categories to vote in; repository search uses [`TechCatalog::classify`] to
//! sort free-form topics and languages into those categories.

/// Category name -> known lower-cased technology tokens.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "frontend",
        &[
            "react", "vue", "angular", "svelte", "next.js", "nuxt", "solid", "html", "css",
            "tailwind", "bootstrap", "material-ui",
        ],
    ),
    (
        "backend",
        &[
            "node.js", "express", "django", "flask", "fastapi", "spring boot", "spring",
            "laravel", "ruby on rails", "asp.net", "nestjs", "actix", "axum", "gin",
        ],
    ),
    (
        "database",
        &[
            "postgresql", "mysql", "mongodb", "sqlite", "redis", "cassandra", "elasticsearch",
            "dynamodb", "firebase",
        ],
    ),
    (
        "devops",
        &[
            "docker", "kubernetes", "aws", "azure", "gcp", "jenkins", "github actions",
            "gitlab ci", "terraform", "ansible", "heroku",
        ],
    ),
    (
        "mobile",
        &["react native", "flutter", "ionic", "xamarin", "swiftui", "jetpack compose"],
    ),
    (
        "language",
        &[
            "javascript", "typescript", "python", "go", "rust", "java", "ruby", "php", "c#",
            "c++", "kotlin", "swift", "scala", "elixir",
        ],
    ),
    (
        "testing",
        &["jest", "pytest", "mocha", "cypress", "playwright", "selenium", "junit", "vitest"],
    ),
    (
        "orm",
        &["prisma", "sqlalchemy", "typeorm", "sequelize", "hibernate", "diesel", "mongoose"],
    ),
    ("api", &["rest", "graphql", "grpc", "websocket", "openapi", "trpc"]),
];

/// Common spellings mapped to the canonical token used in [`CATEGORIES`].
const ALIASES: &[(&str, &str)] = &[
    ("js", "javascript"),
    ("ts", "typescript"),
    ("py", "python"),
    ("python3", "python"),
    ("golang", "go"),
    ("reactjs", "react"),
    ("react.js", "react"),
    ("vuejs", "vue"),
    ("vue.js", "vue"),
    ("angularjs", "angular"),
    ("nextjs", "next.js"),
    ("node", "node.js"),
    ("nodejs", "node.js"),
    ("expressjs", "express"),
    ("express.js", "express"),
    ("springboot", "spring boot"),
    ("rails", "ruby on rails"),
    ("ror", "ruby on rails"),
    ("postgres", "postgresql"),
    ("mongo", "mongodb"),
    ("k8s", "kubernetes"),
    ("amazon web services", "aws"),
    ("google cloud platform", "gcp"),
    ("google cloud", "gcp"),
    ("microsoft azure", "azure"),
    ("react-native", "react native"),
    ("csharp", "c#"),
    ("cpp", "c++"),
];

#[derive(Debug, Clone)]
pub struct TechCatalog {
    categories: Vec<(String, Vec<String>)>,
}

impl Default for TechCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TechCatalog {
    pub fn builtin() -> Self {
        Self {
            categories: CATEGORIES
                .iter()
                .map(|(cat, techs)| {
                    (
                        cat.to_string(),
                        techs.iter().map(|t| t.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Category names in their fixed order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|(c, _)| c.as_str())
    }

    pub fn contains_category(&self, category: &str) -> bool {
        self.categories.iter().any(|(c, _)| c == category)
    }

    /// Category of a known technology, after alias normalisation.
    pub fn classify(&self, tech: &str) -> Option<&str> {
        let canonical = canonical_name(tech);
        self.categories
            .iter()
            .find(|(_, techs)| techs.iter().any(|t| *t == canonical))
            .map(|(c, _)| c.as_str())
    }
}

/// Lower-case a technology name and fold well-known aliases onto one token.
pub fn canonical_name(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_category_order() {
        let catalog = TechCatalog::builtin();
        let cats: Vec<_> = catalog.categories().collect();
        assert_eq!(
            cats,
            vec![
                "frontend", "backend", "database", "devops", "mobile", "language", "testing",
                "orm", "api"
            ]
        );
    }

    #[test]
    fn test_classify_uses_aliases() {
        let catalog = TechCatalog::builtin();
        assert_eq!(catalog.classify("ReactJS"), Some("frontend"));
        assert_eq!(catalog.classify("postgres"), Some("database"));
        assert_eq!(catalog.classify("k8s"), Some("devops"));
        assert_eq!(catalog.classify("TypeScript"), Some("language"));
        assert_eq!(catalog.classify("cobol-on-cogs"), None);
    }

    #[test]
    fn test_canonical_name_passthrough() {
        assert_eq!(canonical_name("  Svelte "), "svelte");
        assert_eq!(canonical_name("Node"), "node.js");
    }

    #[test]
    fn test_contains_only_builtin_categories() {
        let catalog = TechCatalog::builtin();
        assert!(!catalog.contains_category("hosting"));
        assert!(catalog.contains_category("orm"));
    }
}
