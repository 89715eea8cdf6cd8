pub mod banner;
pub mod banner_version;
pub mod feature_tag;

use sea_orm_migration::prelude::*;

pub struct Migrator;

impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(banner::Migration),
            Box::new(banner_version::Migration),
            Box::new(feature_tag::Migration),
        ]
    }
}
