use {super::*, pretty_assertions::assert_eq};

#[test]
fn proxy_requires_wallet() {
    CommandBuilder::new("proxy").expected_failure("no wallet address configured");
}

#[test]
fn short_wallet_is_rejected() {
    CommandBuilder::new("--wallet xel:short proxy")
        .expected_failure("wallet address `xel:short` is too short");
}

#[test]
fn short_wallet_from_environment_is_rejected() {
    CommandBuilder::new("proxy")
        .env("XELPROXY_WALLET", "xel:tiny")
        .expected_failure("wallet address `xel:tiny` is too short");
}

#[test]
fn miner_timeout_must_exceed_keepalive_margin() {
    CommandBuilder::new("--wallet xel:abcdefghijklmnop --miner-timeout 5 proxy")
        .expected_failure("miner timeout must be greater than 5 seconds");
}

#[test]
fn config_file_is_validated() {
    CommandBuilder::new("--config xelproxy.toml proxy")
        .write("xelproxy.toml", "wallet = \"xel:abc\"\n")
        .expected_failure("wallet address `xel:abc` is too short");
}

#[test]
fn unknown_config_key_is_reported() {
    CommandBuilder::new("--config xelproxy.toml proxy")
        .write("xelproxy.toml", "wallets = \"xel:abcdefghijklmnop\"\n")
        .expected_failure("failed to deserialize config file");
}

#[test]
fn missing_certificate_is_reported() {
    CommandBuilder::new(
        "--wallet xel:abcdefghijklmnop --address 127.0.0.1 --xatum-port 0 --getwork-port 0 proxy",
    )
    .expected_failure("failed to open certificate `cert.pem`");
}
