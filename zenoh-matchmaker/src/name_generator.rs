/// Readable server names for nodes started without an explicit id
use markov_namegen::{CharacterChainGenerator, RandomTextGenerator};

/// Place names used to train the generator
const TRAINING_NAMES: &[&str] = &[
    "Arden", "Brisk", "Calder", "Dunmore", "Eastwick", "Fairhold", "Glenrock", "Harrow",
    "Ironvale", "Kestrel", "Lowmoor", "Marrow", "Northam", "Oakridge", "Pellam", "Quarry",
    "Redcliff", "Stonebay", "Thornby", "Umber", "Valen", "Westfall", "Yarrow", "Zennor",
];

const MAX_LEN: usize = 10;

/// Generate a name like `Harrik_317`
///
/// The base is a Markov-chain name made of alphanumerics only, so the result is always a
/// valid single keyexpr chunk.
pub fn generate_server_name() -> String {
    let mut generator = CharacterChainGenerator::builder()
        .with_order(2)
        .with_prior(0.01)
        .train(TRAINING_NAMES.iter().copied())
        .build();

    let base = loop {
        let name = generator.generate_one();
        if !name.is_empty() && name.len() <= MAX_LEN && name.chars().all(char::is_alphanumeric) {
            break name;
        }
    };
    format!("{}_{}", base, rand::random::<u16>() % 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_name_shape() {
        let name = generate_server_name();
        let (base, suffix) = name.split_once('_').unwrap();
        assert!(!base.is_empty() && base.len() <= MAX_LEN);
        assert!(base.chars().all(char::is_alphanumeric));
        assert!(suffix.parse::<u16>().unwrap() < 1000);
    }
}
