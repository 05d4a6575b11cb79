use fake::Fake;
use fake::faker::address::en::{CityName, CountryName, StateName, StreetName, ZipCode};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::{DomainSuffix, SafeEmail, Username};
use fake::faker::job::en::Title;
use fake::faker::lorem::en::{Sentence, Word};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use rand::RngCore;

use crate::errors::GenerationError;
use crate::generators::{GeneratorContext, GeneratorRegistry, TypeGenerator};

/// Name keywords mapped to generator ids, checked in order.
const NAME_RULES: &[(&[&str], &str)] = &[
    (&["email", "mail"], "semantic.email"),
    (&["firstname", "givenname", "forename"], "semantic.first_name"),
    (&["lastname", "surname", "familyname"], "semantic.last_name"),
    (&["fullname", "personname", "customername", "passengername"], "semantic.full_name"),
    (&["phone", "mobile", "telephone", "fax"], "semantic.phone"),
    (&["city", "town"], "semantic.city"),
    (&["country"], "semantic.country"),
    (&["state", "province", "region"], "semantic.state"),
    (&["street", "address"], "semantic.street"),
    (&["zip", "postcode", "postalcode"], "semantic.zip"),
    (&["company", "organization", "organisation", "employer"], "semantic.company"),
    (&["username", "login"], "semantic.username"),
    (&["jobtitle", "position", "occupation"], "semantic.job_title"),
    (&["url", "website", "homepage"], "semantic.url"),
    (&["description", "comment", "note", "remark", "summary"], "semantic.sentence"),
    (&["name"], "semantic.full_name"),
];

/// Generator id suggested by an element or attribute name.
pub fn semantic_id(name: &str) -> Option<&'static str> {
    let normalized: String = name
        .trim_start_matches('@')
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    if normalized.is_empty() {
        return None;
    }
    NAME_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|keyword| normalized.contains(keyword)))
        .map(|(_, id)| *id)
}

pub fn register(registry: &mut GeneratorRegistry) {
    for (id, kind) in [
        ("semantic.first_name", Kind::FirstName),
        ("semantic.last_name", Kind::LastName),
        ("semantic.full_name", Kind::FullName),
        ("semantic.email", Kind::Email),
        ("semantic.phone", Kind::Phone),
        ("semantic.city", Kind::City),
        ("semantic.country", Kind::Country),
        ("semantic.state", Kind::State),
        ("semantic.street", Kind::Street),
        ("semantic.zip", Kind::Zip),
        ("semantic.company", Kind::Company),
        ("semantic.username", Kind::Username),
        ("semantic.job_title", Kind::JobTitle),
        ("semantic.url", Kind::Url),
        ("semantic.sentence", Kind::Sentence),
    ] {
        registry.register_generator(Box::new(FakeGenerator { id, kind }));
    }
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    FirstName,
    LastName,
    FullName,
    Email,
    Phone,
    City,
    Country,
    State,
    Street,
    Zip,
    Company,
    Username,
    JobTitle,
    Url,
    Sentence,
}

/// Realistic values backed by the `fake` crate.
struct FakeGenerator {
    id: &'static str,
    kind: Kind,
}

impl TypeGenerator for FakeGenerator {
    fn id(&self) -> &'static str {
        self.id
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let value: String = match self.kind {
            Kind::FirstName => FirstName().fake_with_rng(rng),
            Kind::LastName => LastName().fake_with_rng(rng),
            Kind::FullName => Name().fake_with_rng(rng),
            Kind::Email => SafeEmail().fake_with_rng(rng),
            Kind::Phone => PhoneNumber().fake_with_rng(rng),
            Kind::City => CityName().fake_with_rng(rng),
            Kind::Country => CountryName().fake_with_rng(rng),
            Kind::State => StateName().fake_with_rng(rng),
            Kind::Street => StreetName().fake_with_rng(rng),
            Kind::Zip => ZipCode().fake_with_rng(rng),
            Kind::Company => CompanyName().fake_with_rng(rng),
            Kind::Username => Username().fake_with_rng(rng),
            Kind::JobTitle => Title().fake_with_rng(rng),
            Kind::Url => {
                let word: String = Word().fake_with_rng(rng);
                let suffix: String = DomainSuffix().fake_with_rng(rng);
                format!("https://www.{}.{suffix}", word.to_lowercase())
            }
            Kind::Sentence => Sentence(3..8).fake_with_rng(rng),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use xsdforge_core::{PrimitiveType, SimpleTypeFacets};

    #[test]
    fn maps_names_to_generators() {
        assert_eq!(semantic_id("FirstName"), Some("semantic.first_name"));
        assert_eq!(semantic_id("Email"), Some("semantic.email"));
        assert_eq!(semantic_id("@contactEmail"), Some("semantic.email"));
        assert_eq!(semantic_id("DepartureCity"), Some("semantic.city"));
        assert_eq!(semantic_id("Username"), Some("semantic.username"));
        assert_eq!(semantic_id("PassengerName"), Some("semantic.full_name"));
        assert_eq!(semantic_id("Quantity"), None);
    }

    #[test]
    fn fake_values_are_deterministic_per_seed() {
        let registry = GeneratorRegistry::new();
        let facets = SimpleTypeFacets::new(PrimitiveType::String);
        let ctx = GeneratorContext {
            name: "Email",
            path: "Root/Email",
            facets: &facets,
            base_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        let generator = registry.get("semantic.email").unwrap();
        let run = || {
            let mut rng = ChaCha8Rng::seed_from_u64(3);
            (0..3)
                .map(|_| generator.generate(&ctx, &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        let first = run();
        assert_eq!(first, run());
        assert!(first.iter().all(|value| value.contains('@')));
    }
}
