#![allow(dead_code)]

pub mod rsa {
    pub const TEST_KEY_ID: &str = "coffeeshop-test-key";
    pub const JWK: &str = include_str!("../data/rsa/jwk.json");
    pub const JWK_MINIMAL: &str = include_str!("../data/rsa/jwk-min.json");
    pub const JWKS: &str = include_str!("../data/rsa/jwks.json");
    pub const PRIVATE_KEY_DER: &[u8] = include_bytes!("../data/rsa/private.der");

    /// Signs with the test key directly through `ring`, independent of the
    /// signing support behind the `private-keys` feature
    pub fn sign_rs256(data: &[u8]) -> Vec<u8> {
        let key_pair = ring::signature::RsaKeyPair::from_der(PRIVATE_KEY_DER).unwrap();
        let mut buf = vec![0; key_pair.public().modulus_len()];
        key_pair
            .sign(
                &ring::signature::RSA_PKCS1_SHA256,
                &ring::rand::SystemRandom::new(),
                data,
                &mut buf,
            )
            .unwrap();
        buf
    }
}
