//! Global configuration (A3): default arena/pool sizing, growth factors, the
//! debug fill pattern, and the leak-detection toggle consumed by C6–C9.

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;
use core::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "std")]
use std::sync::OnceLock;

#[cfg(not(feature = "std"))]
use once_cell::race::OnceBox;

/// Global memory configuration.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Enables debug-mode double-free / double-destroy assertions in
    /// arenas, block pools, and the arc payload.
    pub enable_leak_detection: bool,

    /// Defaults consumed by [`crate::allocator::block::BlockAllocator`] and
    /// [`crate::allocator::blockpool::LinkedBlockPool`].
    pub default_pool_config: DefaultPoolConfig,

    /// Defaults consumed by [`crate::allocator::arena::Arena`].
    pub default_arena_config: DefaultArenaConfig,
}

/// Default sizing for block pools.
#[derive(Debug, Clone)]
pub struct DefaultPoolConfig {
    /// Initial number of blocks carved from the first pool.
    pub initial_block_count: usize,

    /// Factor applied to a pool's byte size when a linked blockpool grows
    /// (`SPEC_FULL.md` §4.6). Must be `>= 1.0`.
    pub growth_factor: f32,
}

/// Default sizing for arenas.
#[derive(Debug, Clone)]
pub struct DefaultArenaConfig {
    /// Size of the first backing chunk an arena requests from its parent
    /// allocator.
    pub chunk_size: usize,

    /// Upper bound on any single chunk request, regardless of how large the
    /// triggering allocation is.
    pub max_chunk_size: usize,

    /// Factor applied to the previous chunk's size when an arena grows.
    /// Must be `>= 1.0`.
    pub growth_factor: f32,

    /// Byte pattern written over a region on `clear()` in debug builds, to
    /// make use-after-clear bugs visible.
    pub debug_fill_byte: u8,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enable_leak_detection: cfg!(debug_assertions),
            default_pool_config: DefaultPoolConfig::default(),
            default_arena_config: DefaultArenaConfig::default(),
        }
    }
}

impl Default for DefaultPoolConfig {
    fn default() -> Self {
        Self { initial_block_count: 128, growth_factor: 2.0 }
    }
}

impl Default for DefaultArenaConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
            max_chunk_size: 16 * 1024 * 1024,
            growth_factor: 2.0,
            debug_fill_byte: 0xDE,
        }
    }
}

#[cfg(feature = "std")]
static GLOBAL_CONFIG: OnceLock<MemoryConfig> = OnceLock::new();

#[cfg(not(feature = "std"))]
static GLOBAL_CONFIG: OnceBox<MemoryConfig> = OnceBox::new();

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Installs `config` as the process-wide default. May only succeed once;
/// later calls (including the implicit one made by [`get`]) return
/// [`ConfigError::AlreadyInitialized`].
pub fn initialize(config: MemoryConfig) -> Result<(), ConfigError> {
    if INITIALIZED.load(Ordering::Acquire) {
        return Err(ConfigError::AlreadyInitialized);
    }
    config.validate()?;

    #[cfg(feature = "std")]
    GLOBAL_CONFIG.set(config).map_err(|_| ConfigError::AlreadyInitialized)?;
    #[cfg(not(feature = "std"))]
    GLOBAL_CONFIG.set(Box::new(config)).map_err(|_| ConfigError::AlreadyInitialized)?;

    INITIALIZED.store(true, Ordering::Release);
    Ok(())
}

/// Returns the global configuration, lazily installing `MemoryConfig::default()`
/// if nothing has been configured yet.
pub fn get() -> &'static MemoryConfig {
    #[cfg(feature = "std")]
    {
        GLOBAL_CONFIG.get_or_init(MemoryConfig::default)
    }
    #[cfg(not(feature = "std"))]
    {
        GLOBAL_CONFIG.get_or_init(|| Box::new(MemoryConfig::default()))
    }
}

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

/// Errors raised while building or installing a [`MemoryConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    AlreadyInitialized,
    InvalidValue(&'static str),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AlreadyInitialized => write!(f, "memory config already initialized"),
            Self::InvalidValue(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

impl MemoryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_pool_config.growth_factor < 1.0 {
            return Err(ConfigError::InvalidValue("pool growth factor must be >= 1.0"));
        }
        if self.default_arena_config.growth_factor < 1.0 {
            return Err(ConfigError::InvalidValue("arena growth factor must be >= 1.0"));
        }
        if self.default_arena_config.chunk_size == 0 {
            return Err(ConfigError::InvalidValue("arena chunk size must be > 0"));
        }
        if self.default_arena_config.max_chunk_size < self.default_arena_config.chunk_size {
            return Err(ConfigError::InvalidValue("max chunk size must be >= chunk size"));
        }
        Ok(())
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for [`MemoryConfig`].
pub struct ConfigBuilder {
    config: MemoryConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self { config: MemoryConfig::default() }
    }

    pub fn enable_leak_detection(mut self, enable: bool) -> Self {
        self.config.enable_leak_detection = enable;
        self
    }

    pub fn default_pool_initial_block_count(mut self, count: usize) -> Self {
        self.config.default_pool_config.initial_block_count = count;
        self
    }

    pub fn default_pool_growth_factor(mut self, factor: f32) -> Self {
        self.config.default_pool_config.growth_factor = factor;
        self
    }

    pub fn default_arena_chunk_size(mut self, size: usize) -> Self {
        self.config.default_arena_config.chunk_size = size;
        self
    }

    pub fn default_arena_max_chunk_size(mut self, size: usize) -> Self {
        self.config.default_arena_config.max_chunk_size = size;
        self
    }

    pub fn default_arena_growth_factor(mut self, factor: f32) -> Self {
        self.config.default_arena_config.growth_factor = factor;
        self
    }

    pub fn debug_fill_byte(mut self, byte: u8) -> Self {
        self.config.default_arena_config.debug_fill_byte = byte;
        self
    }

    pub fn build(self) -> Result<MemoryConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(MemoryConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_sub_unity_growth_factor() {
        let mut config = MemoryConfig::default();
        config.default_arena_config.growth_factor = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_max_chunk_below_chunk() {
        let mut config = MemoryConfig::default();
        config.default_arena_config.max_chunk_size = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = MemoryConfig::builder()
            .enable_leak_detection(true)
            .default_arena_chunk_size(4096)
            .default_pool_initial_block_count(64)
            .build()
            .unwrap();
        assert!(config.enable_leak_detection);
        assert_eq!(config.default_arena_config.chunk_size, 4096);
        assert_eq!(config.default_pool_config.initial_block_count, 64);
    }
}
