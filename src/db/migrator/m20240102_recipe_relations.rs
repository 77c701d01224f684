use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RecipeTags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RecipeTags::RecipeId).integer().not_null())
                    .col(ColumnDef::new(RecipeTags::TagId).integer().not_null())
                    .primary_key(
                        Index::create()
                            .name("pk_recipe_tags")
                            .col(RecipeTags::RecipeId)
                            .col(RecipeTags::TagId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_recipe_tags_recipe_id")
                            .from(RecipeTags::Table, RecipeTags::RecipeId)
                            .to(Recipes::Table, Recipes::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_recipe_tags_tag_id")
                            .from(RecipeTags::Table, RecipeTags::TagId)
                            .to(Tags::Table, Tags::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Favorites and shopping carts share this table; the composite key
        // makes a second insert of the same (user, recipe, kind) fail.
        manager
            .create_table(
                Table::create()
                    .table(RecipeLists::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RecipeLists::UserId).integer().not_null())
                    .col(ColumnDef::new(RecipeLists::RecipeId).integer().not_null())
                    .col(ColumnDef::new(RecipeLists::ListKind).string().not_null())
                    .col(ColumnDef::new(RecipeLists::CreatedAt).string().not_null())
                    .primary_key(
                        Index::create()
                            .name("pk_recipe_lists")
                            .col(RecipeLists::UserId)
                            .col(RecipeLists::RecipeId)
                            .col(RecipeLists::ListKind),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_recipe_lists_user_id")
                            .from(RecipeLists::Table, RecipeLists::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_recipe_lists_recipe_id")
                            .from(RecipeLists::Table, RecipeLists::RecipeId)
                            .to(Recipes::Table, Recipes::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Subscriptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Subscriptions::FollowerId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::FollowingId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::CreatedAt)
                            .string()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk_subscriptions")
                            .col(Subscriptions::FollowerId)
                            .col(Subscriptions::FollowingId),
                    )
                    .check(
                        Expr::col(Subscriptions::FollowerId)
                            .ne(Expr::col(Subscriptions::FollowingId)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscriptions_follower_id")
                            .from(Subscriptions::Table, Subscriptions::FollowerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscriptions_following_id")
                            .from(Subscriptions::Table, Subscriptions::FollowingId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Subscriptions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RecipeLists::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RecipeTags::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum RecipeTags {
    Table,
    RecipeId,
    TagId,
}

#[derive(DeriveIden)]
enum RecipeLists {
    Table,
    UserId,
    RecipeId,
    ListKind,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Subscriptions {
    Table,
    FollowerId,
    FollowingId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Recipes {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Tags {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
