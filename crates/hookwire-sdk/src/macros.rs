//! Declarative macros for plugin development.

/// Export the three entry points a host looks for.
///
/// `register` and `unregister` are paths to functions of type
/// `fn(&mut Manager<'_>) -> Result<(), RegistryError>`.
///
/// # Example
///
/// ```rust,ignore
/// use hookwire_sdk::prelude::*;
///
/// fn edit_seed(_: i32) -> i32 {
///     0
/// }
///
/// fn register(manager: &mut Manager<'_>) -> Result<(), RegistryError> {
///     manager.register_fn(handles::SEED_GENERATION, edit_seed as fn(i32) -> i32)
/// }
///
/// fn unregister(manager: &mut Manager<'_>) -> Result<(), RegistryError> {
///     manager.unregister_fn(handles::SEED_GENERATION, edit_seed as fn(i32) -> i32)
/// }
///
/// declare_plugin! {
///     version: API_VERSION,
///     accepts: VersionWindow::exact(API_VERSION),
///     register: register,
///     unregister: unregister,
/// }
/// ```
#[macro_export]
macro_rules! declare_plugin {
    (
        version: $version:expr,
        accepts: $accepts:expr,
        register: $register:path,
        unregister: $unregister:path $(,)?
    ) => {
        #[no_mangle]
        pub unsafe extern "C" fn hookwire_plugin_version(host: u32) -> $crate::abi::VersionReply {
            $crate::abi::version_reply(host, $version, $accepts)
        }

        #[no_mangle]
        pub unsafe extern "C" fn hookwire_plugin_register(
            manager: *const $crate::abi::RawManager,
        ) -> i32 {
            unsafe { $crate::abi::run_entry(manager, $register) }
        }

        #[no_mangle]
        pub unsafe extern "C" fn hookwire_plugin_unregister(
            manager: *const $crate::abi::RawManager,
        ) -> i32 {
            unsafe { $crate::abi::run_entry(manager, $unregister) }
        }
    };
    (
        version: $version:expr,
        register: $register:path,
        unregister: $unregister:path $(,)?
    ) => {
        $crate::declare_plugin! {
            version: $version,
            accepts: $crate::version::VersionWindow::exact($version),
            register: $register,
            unregister: $unregister,
        }
    };
}
