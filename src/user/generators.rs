use async_trait::async_trait;
use rand::Rng;

const REFERRAL_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const REFERRAL_CODE_LEN: usize = 8;

/// Source of the generated parts of a new user's identity
#[async_trait]
pub trait IdentityGenerator: Send + Sync {
    /// Candidate referral code; uniqueness is checked by the caller
    async fn referral_code(&self) -> String;
    /// Fallback for users who registered without a display name
    async fn display_name(&self) -> String;
}

/// Random uppercase alphanumeric codes and capitalized pet names
#[derive(Default)]
pub struct RandomIdentityGenerator {
    petnames: petname::Petnames<'static>,
}

impl RandomIdentityGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl IdentityGenerator for RandomIdentityGenerator {
    async fn referral_code(&self) -> String {
        let mut rng = rand::rng();
        (0..REFERRAL_CODE_LEN)
            .map(|_| REFERRAL_ALPHABET[rng.random_range(0..REFERRAL_ALPHABET.len())] as char)
            .collect()
    }

    async fn display_name(&self) -> String {
        let raw = self.petnames.generate_one(2, " ");
        raw.split(' ').map(capitalize).collect::<Vec<_>>().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn referral_codes_are_uppercase_alphanumeric() {
        let generator = RandomIdentityGenerator::new();
        for _ in 0..20 {
            let code = generator.referral_code().await;
            assert_eq!(code.len(), REFERRAL_CODE_LEN);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn display_names_are_two_capitalized_words() {
        let name = RandomIdentityGenerator::new().display_name().await;
        let words: Vec<&str> = name.split(' ').collect();
        assert_eq!(words.len(), 2);
        assert!(words
            .iter()
            .all(|w| w.chars().next().is_some_and(char::is_uppercase)));
    }

    #[test]
    fn capitalize_handles_empty_words() {
        assert_eq!(capitalize("otter"), "Otter");
        assert_eq!(capitalize(""), "");
    }
}
