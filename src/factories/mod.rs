pub mod assistant_factory;
