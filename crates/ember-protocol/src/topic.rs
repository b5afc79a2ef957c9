//! Content topic names.
//!
//! Every topic has the form `/xmtp/0/{name}/proto`.

const PREFIX: &str = "/xmtp/0/";
const SUFFIX: &str = "/proto";

fn build(name: &str) -> String {
    format!("{PREFIX}{name}{SUFFIX}")
}

/// Where a wallet publishes its public key bundle.
pub fn contact_topic(wallet_address: &str) -> String {
    build(&format!("contact-{wallet_address}"))
}

/// Where the first message between two wallets is announced.
pub fn intro_topic(wallet_address: &str) -> String {
    build(&format!("intro-{wallet_address}"))
}

/// Where sealed invitations for a wallet are delivered.
pub fn invite_topic(wallet_address: &str) -> String {
    build(&format!("invite-{wallet_address}"))
}

/// V1 direct-message topic. Address order does not matter.
pub fn dm_topic(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    build(&format!("dm-{first}-{second}"))
}

/// V2 conversation topic for a random identifier.
pub fn v2_topic(random: &str) -> String {
    build(&format!("m-{random}"))
}

/// Whether `topic` is well formed: the standard prefix and suffix around a
/// non-empty name of printable ASCII.
pub fn is_valid_topic(topic: &str) -> bool {
    let Some(name) = topic
        .strip_prefix(PREFIX)
        .and_then(|rest| rest.strip_suffix(SUFFIX))
    else {
        return false;
    };
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic())
}
