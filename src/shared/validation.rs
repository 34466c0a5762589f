use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating document category slugs
    /// Lowercase alphanumeric segments joined by single hyphens or underscores
    /// - Valid: "constitution", "voter-guide", "research_papers", "bylaws2024"
    /// - Invalid: "-guide", "guide-", "voter--guide", "Voter", "voter guide"
    pub static ref CATEGORY_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:[-_][a-z0-9]+)*$").unwrap();
}
