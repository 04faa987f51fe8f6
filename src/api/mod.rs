pub mod harvester;
pub mod models;
