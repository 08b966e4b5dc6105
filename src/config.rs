/// Engine-level configuration. Deliberately small: the trie is a library, not
/// a service, so there is no file/env configuration layer to speak of.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// When set, mutations retain the pre-image of every overwritten or
    /// deleted node in the backend instead of letting them become orphaned,
    /// so an older root can still be walked after a later write. See the
    /// mutator's `save_stack`/`format_node` hooks.
    pub is_checkpoint: bool,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checkpoint(mut self, is_checkpoint: bool) -> Self {
        self.is_checkpoint = is_checkpoint;
        self
    }
}
