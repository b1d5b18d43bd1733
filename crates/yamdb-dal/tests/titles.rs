use futures::TryStreamExt as _;
use sqlx::Executor;
use yamdb_dal::{
    category::CategoryRepositoryImpl,
    genre::GenreRepositoryImpl,
    review::{CreateReview, ReviewRepositoryImpl, UpdateReview},
    title::{CreateTitle, TitleFilter, TitleRepositoryImpl, UpdateTitle},
    Error, ListingParams, Order,
};

const TEST_DATA: &str = r#"
INSERT INTO category (id, name, slug) VALUES (1, 'Movies', 'movie');
INSERT INTO category (id, name, slug) VALUES (2, 'Books', 'book');

INSERT INTO genre (id, name, slug) VALUES (1, 'Drama', 'drama');
INSERT INTO genre (id, name, slug) VALUES (2, 'Comedy', 'comedy');
INSERT INTO genre (id, name, slug) VALUES (3, 'Science fiction', 'sci-fi');

INSERT INTO users (id, username, email, role, date_joined) VALUES (1, 'ivan', 'ivan@example.com', 'user', datetime());
INSERT INTO users (id, username, email, role, date_joined) VALUES (2, 'pepa', 'pepa@example.com', 'user', datetime());
INSERT INTO users (id, username, email, role, date_joined) VALUES (3, 'moder', 'moder@example.com', 'moderator', datetime());

INSERT INTO title (id, name, year, description, category_id) VALUES (1, 'Solaris', 1972, NULL, 1);
INSERT INTO title (id, name, year, description, category_id) VALUES (2, 'The Cyberiad', 1965, 'Stories', 2);
INSERT INTO title (id, name, year, description, category_id) VALUES (3, 'Some Like It Hot', 1959, NULL, 1);

INSERT INTO title_genres (title_id, genre_id) VALUES (1, 1);
INSERT INTO title_genres (title_id, genre_id) VALUES (1, 3);
INSERT INTO title_genres (title_id, genre_id) VALUES (2, 3);
INSERT INTO title_genres (title_id, genre_id) VALUES (3, 2);
"#;

async fn init_db() -> sqlx::Pool<sqlx::Sqlite> {
    const DB_URL: &str = "sqlite::memory:";
    let conn = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .connect(DB_URL)
        .await
        .unwrap();
    conn.execute("PRAGMA foreign_keys = ON").await.unwrap();
    sqlx::migrate!("../../migrations").run(&conn).await.unwrap();

    conn.execute_many(TEST_DATA)
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    conn
}

fn review(text: &str, score: i64) -> CreateReview {
    CreateReview {
        text: text.to_string(),
        score,
    }
}

#[tokio::test]
async fn test_rating_is_mean_of_scores() {
    let conn = init_db().await;
    let titles = TitleRepositoryImpl::new(conn.clone());
    let reviews = ReviewRepositoryImpl::new(conn);

    let title = titles.get(1).await.unwrap();
    assert_eq!(title.rating, None);
    assert_eq!(title.genre.len(), 2);
    assert_eq!(title.category.unwrap().slug, "movie");

    reviews.create(1, 1, review("Great", 8)).await.unwrap();
    reviews.create(1, 2, review("Fine", 6)).await.unwrap();
    let title = titles.get(1).await.unwrap();
    assert_eq!(title.rating, Some(7.0));

    reviews.create(1, 3, review("Meh", 5)).await.unwrap();
    let title = titles.get(1).await.unwrap();
    let rating = title.rating.unwrap();
    assert!((rating - 19.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_one_review_per_author() {
    let conn = init_db().await;
    let reviews = ReviewRepositoryImpl::new(conn);

    assert!(!reviews.exists_for(1, 1).await.unwrap());
    let first = reviews.create(1, 1, review("Great", 8)).await.unwrap();
    assert_eq!(first.author, "ivan");
    assert!(reviews.exists_for(1, 1).await.unwrap());

    for score in [1, 8, 10] {
        let res = reviews.create(1, 1, review("Again", score)).await;
        assert!(matches!(res, Err(Error::Conflict(_))));
    }

    // same author, other title
    reviews.create(2, 1, review("Funny", 9)).await.unwrap();

    let updated = reviews
        .update(
            1,
            first.id,
            UpdateReview {
                score: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.score, 3);
    assert_eq!(updated.text, "Great");

    let res = reviews.get(2, first.id).await;
    assert!(matches!(res, Err(Error::RecordNotFound(_))));
}

#[tokio::test]
async fn test_title_create_and_update() {
    let conn = init_db().await;
    let titles = TitleRepositoryImpl::new(conn);

    let created = titles
        .create(CreateTitle {
            name: "Stalker".into(),
            year: 1979,
            description: Some("Zone".into()),
            genre: vec!["sci-fi".into(), "drama".into()],
            category: Some("movie".into()),
        })
        .await
        .unwrap();
    assert_eq!(created.name, "Stalker");
    let slugs: Vec<_> = created.genre.iter().map(|g| g.slug.as_str()).collect();
    assert_eq!(slugs, vec!["drama", "sci-fi"]);

    let updated = titles
        .update(
            created.id,
            UpdateTitle {
                genre: Some(vec!["comedy".into()]),
                category: Some(Some("book".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Stalker");
    assert_eq!(updated.year, 1979);
    assert_eq!(updated.genre.len(), 1);
    assert_eq!(updated.category.unwrap().slug, "book");

    let res = titles
        .create(CreateTitle {
            name: "Nothing".into(),
            year: 2000,
            description: None,
            genre: vec!["unknown".into()],
            category: None,
        })
        .await;
    assert!(matches!(res, Err(Error::InvalidReference(_))));

    let res = titles.update(999, UpdateTitle::default()).await;
    assert!(matches!(res, Err(Error::RecordNotFound(_))));
}

#[tokio::test]
async fn test_title_filters() {
    let conn = init_db().await;
    let titles = TitleRepositoryImpl::new(conn);

    let all = titles
        .list(ListingParams::new(0, 10), TitleFilter::default())
        .await
        .unwrap();
    assert_eq!(all.total, 3);
    let names: Vec<_> = all.rows.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Solaris", "Some Like It Hot", "The Cyberiad"]);

    let sci_fi = titles
        .list(
            ListingParams::new(0, 10),
            TitleFilter {
                genre: Some("sci-fi".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(sci_fi.total, 2);

    let movies_1959 = titles
        .list(
            ListingParams::new(0, 10),
            TitleFilter {
                category: Some("movie".into()),
                year: Some(1959),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(movies_1959.total, 1);
    assert_eq!(movies_1959.rows[0].name, "Some Like It Hot");

    let by_name = titles
        .list(
            ListingParams::new(0, 10),
            TitleFilter {
                name: Some("cyber".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_name.total, 1);
    assert_eq!(by_name.rows[0].genre[0].slug, "sci-fi");

    let page = titles
        .list(
            ListingParams::new(1, 1).with_order(vec![Order::Desc("year".into())]),
            TitleFilter::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0].name, "The Cyberiad");

    let res = titles
        .list(
            ListingParams::new(0, 10).with_order(vec![Order::Asc("description".into())]),
            TitleFilter::default(),
        )
        .await;
    assert!(matches!(res, Err(Error::InvalidOrderByField(_))));
}

#[tokio::test]
async fn test_category_delete_keeps_titles() {
    let conn = init_db().await;
    let categories = CategoryRepositoryImpl::new(conn.clone());
    let titles = TitleRepositoryImpl::new(conn);

    categories.delete("movie").await.unwrap();
    let title = titles.get(1).await.unwrap();
    assert!(title.category.is_none());
    assert_eq!(titles.get(3).await.unwrap().name, "Some Like It Hot");

    let res = categories.delete("movie").await;
    assert!(matches!(res, Err(Error::RecordNotFound(_))));
}

#[tokio::test]
async fn test_genre_delete_removes_links_only() {
    let conn = init_db().await;
    let genres = GenreRepositoryImpl::new(conn.clone());
    let titles = TitleRepositoryImpl::new(conn);

    genres.delete("sci-fi").await.unwrap();
    let title = titles.get(1).await.unwrap();
    assert_eq!(title.genre.len(), 1);
    assert_eq!(title.genre[0].slug, "drama");
    assert!(titles.exists(2).await.unwrap());
}

#[tokio::test]
async fn test_title_delete_cascades() {
    let conn = init_db().await;
    let titles = TitleRepositoryImpl::new(conn.clone());
    let reviews = ReviewRepositoryImpl::new(conn.clone());
    let comments = yamdb_dal::comment::CommentRepositoryImpl::new(conn.clone());

    let r = reviews.create(1, 1, review("Great", 8)).await.unwrap();
    comments
        .create(
            r.id,
            2,
            yamdb_dal::comment::CreateComment {
                text: "Agree".into(),
            },
        )
        .await
        .unwrap();

    titles.delete(1).await.unwrap();
    assert!(!titles.exists(1).await.unwrap());

    let reviews_left: i64 = sqlx::query_scalar("SELECT count(*) FROM review")
        .fetch_one(&conn)
        .await
        .unwrap();
    let comments_left: i64 = sqlx::query_scalar("SELECT count(*) FROM comment")
        .fetch_one(&conn)
        .await
        .unwrap();
    assert_eq!(reviews_left, 0);
    assert_eq!(comments_left, 0);
}

#[tokio::test]
async fn test_slug_entities() {
    let conn = init_db().await;
    let genres = GenreRepositoryImpl::new(conn);

    let created = genres
        .create(yamdb_dal::genre::CreateGenre {
            name: "Horror".into(),
            slug: "horror".into(),
        })
        .await
        .unwrap();
    assert_eq!(created.slug, "horror");

    let res = genres
        .create(yamdb_dal::genre::CreateGenre {
            name: "Horror 2".into(),
            slug: "horror".into(),
        })
        .await;
    assert!(matches!(res, Err(Error::Duplicate(_))));

    let found = genres
        .list(ListingParams::new(0, 10), Some("sci"))
        .await
        .unwrap();
    assert_eq!(found.total, 1);
    assert_eq!(found.rows[0].slug, "sci-fi");

    let all = genres.list(ListingParams::new(0, 2), None).await.unwrap();
    assert_eq!(all.total, 4);
    assert_eq!(all.rows.len(), 2);
    assert_eq!(all.rows[0].slug, "comedy");
}

#[tokio::test]
async fn test_update_clears_nullable_fields() {
    let conn = init_db().await;
    let titles = TitleRepositoryImpl::new(conn);

    let untouched = titles
        .update(
            2,
            UpdateTitle {
                name: Some("Cyberiad".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(untouched.description.as_deref(), Some("Stories"));
    assert_eq!(untouched.category.unwrap().slug, "book");

    let cleared = titles
        .update(
            2,
            UpdateTitle {
                description: Some(None),
                category: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.name, "Cyberiad");
    assert!(cleared.description.is_none());
    assert!(cleared.category.is_none());
}
