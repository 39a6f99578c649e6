use crate::{cycle_check::ResolutionGuard, errors::ResolveError, types::BindingKey};

/// Runtime checks and lookup behaviour of a [ScopeDirectory](crate::ScopeDirectory)
///
/// Production mode skips all checks. Development mode detects cyclic dependencies
/// and bindings placed into scopes which do not support the bound class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    detect_cycles: bool,
    check_illegal_bindings: bool,
    allow_multiple_root_scopes: bool,
    use_fallback: bool,
}
impl Default for Configuration {
    fn default() -> Self {
        Self::for_production()
    }
}

impl Configuration {
    pub fn for_production() -> Self {
        Configuration {
            detect_cycles: false,
            check_illegal_bindings: false,
            allow_multiple_root_scopes: true,
            use_fallback: false,
        }
    }

    pub fn for_development() -> Self {
        Configuration {
            detect_cycles: true,
            check_illegal_bindings: true,
            ..Self::for_production()
        }
    }

    /// Opening a second root scope fails
    pub fn prevent_multiple_root_scopes(mut self) -> Self {
        self.allow_multiple_root_scopes = false;
        self
    }

    pub fn allow_multiple_root_scopes(mut self) -> Self {
        self.allow_multiple_root_scopes = true;
        self
    }

    /// Consult the fallback factory source when the primary registry misses
    pub fn enable_fallback(mut self) -> Self {
        self.use_fallback = true;
        self
    }

    pub fn disable_fallback(mut self) -> Self {
        self.use_fallback = false;
        self
    }

    pub fn detects_cycles(&self) -> bool {
        self.detect_cycles
    }

    pub fn checks_illegal_bindings(&self) -> bool {
        self.check_illegal_bindings
    }

    pub fn allows_multiple_root_scopes(&self) -> bool {
        self.allow_multiple_root_scopes
    }

    pub fn uses_fallback(&self) -> bool {
        self.use_fallback
    }

    /// Marks the start of a resolution on the current thread
    ///
    /// The returned guard ends the resolution once dropped. Without cycle detection nothing is tracked.
    pub(crate) fn enter_resolution(
        &self,
        key: &BindingKey,
    ) -> Result<Option<ResolutionGuard>, ResolveError> {
        if !self.detect_cycles {
            return Ok(None);
        }
        ResolutionGuard::enter(key.clone()).map(Some)
    }
}
