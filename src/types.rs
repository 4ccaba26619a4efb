/// Home-network number; unique key of a record within its category.
/// Example: `85291234567`
pub type PrimaryId = String;
/// Paired secondary-network number (may be empty).
/// Example: `13812345678`
pub type SecondaryId = String;
/// First seven digits of a secondary number, used as the location cache key.
/// Example: `1381234`
pub type AreaPrefix = String;
/// Identifier for the upstream source that produced candidates.
/// Examples: `ordinary`, `special`
pub type SourceId = String;
/// Include/exclude filter token parsed from user text.
/// Examples: `888`, `520`
pub type Token = String;
