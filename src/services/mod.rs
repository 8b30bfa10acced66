// Question pipeline
pub mod assistant;
pub mod classifier;
pub mod dispatcher;
pub mod narrator;

// Store-backed reports
pub mod reports;

// External services
pub mod language_model;
