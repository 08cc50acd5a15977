pub mod books;
pub mod users;

use readshelf_kernel::ModuleRegistry;

use crate::app::Services;

/// Register all application modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, services: &Services) -> anyhow::Result<()> {
    registry.register(users::create_module(services))?;
    registry.register(books::create_module(services))?;
    Ok(())
}
