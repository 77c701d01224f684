pub mod limits {

    pub const MAX_EMAIL_LEN: usize = 254;

    pub const MAX_USERNAME_LEN: usize = 150;

    pub const MAX_PERSON_NAME_LEN: usize = 150;

    pub const MAX_RECIPE_NAME_LEN: usize = 256;

    pub const MAX_TAG_LEN: usize = 32;

    pub const MAX_INGREDIENT_NAME_LEN: usize = 128;

    pub const MAX_UNIT_LEN: usize = 64;

    /// Shared bound for cooking time (minutes) and ingredient amounts.
    pub const MIN_QUANTITY: i32 = 1;

    pub const MAX_QUANTITY: i32 = 32_000;
}

pub mod users {

    /// Collides with the `/users/me` route.
    pub const RESERVED_USERNAME: &str = "me";

    pub const USERNAME_PATTERN: &str = r"^[\w.@+-]+$";
}

pub mod session {

    pub const USER_ID_KEY: &str = "user_id";
}
