pub mod bot_factory;
