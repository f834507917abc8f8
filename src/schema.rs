table! {
    articles (id) {
        id -> Int8,
        slug -> Text,
        title -> Text,
        description -> Text,
        body -> Text,
        tag_list -> Array<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        favorites_count -> Int4,
        author_id -> Int8,
        version -> Int4,
    }
}

table! {
    comments (id) {
        id -> Int8,
        body -> Text,
        article_id -> Int8,
        author_id -> Int8,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    favorites (user_id, article_id) {
        user_id -> Int8,
        article_id -> Int8,
    }
}

table! {
    follows (follower_id, followed_id) {
        follower_id -> Int8,
        followed_id -> Int8,
    }
}

table! {
    tags (tag) {
        tag -> Text,
    }
}

table! {
    users (id) {
        id -> Int8,
        username -> Text,
        email -> Text,
        password_hash -> Text,
        bio -> Text,
        image -> Text,
        version -> Int4,
    }
}

joinable!(articles -> users (author_id));
joinable!(comments -> articles (article_id));
joinable!(comments -> users (author_id));
joinable!(favorites -> articles (article_id));
joinable!(favorites -> users (user_id));

allow_tables_to_appear_in_same_query!(articles, comments, favorites, follows, tags, users,);
