mod allow_list_validator;

pub use allow_list_validator::AllowListValidator;
