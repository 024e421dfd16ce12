// Elevated tier: /api/root/*, platform operator tokens only. Works on the
// companies registry in the main database.

pub mod companies;
